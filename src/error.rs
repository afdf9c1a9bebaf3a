// src/error.rs

use std::{borrow::Cow, collections::BTreeMap, fmt};

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use sqlx::error::ErrorKind;
use validator::{ValidationError, ValidationErrors};

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request, with a single detail message
    BadRequest(String),

    // 400 Bad Request, with messages keyed by field
    Validation(ValidationErrors),

    // 401, no credentials were sent
    NotAuthenticated,

    // 401, a bearer token was sent but is unusable
    InvalidToken,

    // 401, e.g. wrong username/password at the token endpoint
    AuthError(String),

    // 403, authenticated but not allowed
    Forbidden,

    // 404 Not Found
    NotFound(String),
}

impl AppError {
    /// Builds a validation error carrying one message for one field.
    pub fn field(field: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, ValidationError::new("invalid").with_message(message.into()));
        AppError::Validation(errors)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Flattens validator output into `{"field": ["message", ...]}`.
fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => e.code.to_string(),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "detail": "Internal Server Error" }),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "detail": msg })),
            AppError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, json!(field_messages(&errors)))
            }
            AppError::NotAuthenticated => (
                StatusCode::UNAUTHORIZED,
                json!({ "detail": "Authentication credentials were not provided." }),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "detail": "Given token not valid for any token type",
                    "code": "token_not_valid",
                }),
            ),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, json!({ "detail": msg })),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "detail": "You do not have permission to perform this action." }),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "detail": msg })),
        };

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into an `AppError`.
/// Allows using `?` operator on database queries.
///
/// CHECK constraint failures are the caller's fault and surface as validation errors;
/// anything else unexpected is a 500.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return AppError::NotFound("Not found.".to_string());
        }
        if let Some(db_err) = err.as_database_error() {
            if db_err.kind() == ErrorKind::CheckViolation {
                return AppError::field("non_field_errors", db_err.message().to_string());
            }
        }
        AppError::InternalServerError(err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Returns true when `err` is a database constraint failure of the given kind.
pub fn is_constraint(err: &sqlx::Error, kind: ErrorKind) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.kind() == kind)
        .unwrap_or(false)
}
