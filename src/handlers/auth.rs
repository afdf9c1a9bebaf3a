// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    config::Config,
    error::AppError,
    handlers::users::{USER_COLUMNS, username_conflict},
    models::user::{RefreshRequest, RegisterRequest, RegisteredUser, TokenPair, TokenRequest, User},
    utils::{
        extract::ValidJson,
        hash::{hash_password, verify_password},
        jwt::{TokenType, sign_token, verify_token},
    },
};

const BAD_CREDENTIALS: &str = "No active account found with the given credentials";

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the public fields of the new account.
pub async fn register(
    State(pool): State<SqlitePool>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = payload.username.unwrap_or_default();
    let hashed_password = hash_password(&payload.password.unwrap_or_default())?;

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (username, password, email, first_name, last_name, is_staff, date_joined)
        VALUES (?, ?, ?, ?, ?, FALSE, ?)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&username)
    .bind(hashed_password)
    .bind(payload.email)
    .bind(payload.first_name)
    .bind(payload.last_name)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(username_conflict)?;

    tracing::info!(user_id = user.id, "registered user '{}'", username);

    Ok((StatusCode::CREATED, Json(RegisteredUser::from(user))))
}

/// Exchanges a username and password for an access/refresh token pair.
pub async fn obtain_token(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    ValidJson(payload): ValidJson<TokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = payload.username.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
    ))
    .bind(&username)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::AuthError(BAD_CREDENTIALS.to_string()))?;

    if !verify_password(&password, &user.password)? {
        tracing::info!("failed login for '{}'", username);
        return Err(AppError::AuthError(BAD_CREDENTIALS.to_string()));
    }

    let access = sign_token(
        user.id,
        TokenType::Access,
        &config.jwt_secret,
        config.access_token_ttl,
    )?;
    let refresh = sign_token(
        user.id,
        TokenType::Refresh,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )?;

    Ok(Json(TokenPair { refresh, access }))
}

/// Issues a fresh access token for a valid refresh token.
pub async fn refresh_token(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    ValidJson(payload): ValidJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let refresh = payload.refresh.unwrap_or_default();
    let claims = verify_token(&refresh, TokenType::Refresh, &config.jwt_secret)?;
    let user_id = claims.user_id()?;

    sqlx::query("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::AuthError("User not found".to_string()))?;

    let access = sign_token(
        user_id,
        TokenType::Access,
        &config.jwt_secret,
        config.access_token_ttl,
    )?;

    Ok(Json(json!({ "access": access })))
}
