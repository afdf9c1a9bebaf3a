// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    permissions::{Actor, AuthUser},
    state::AppState,
};

/// Distinguishes short-lived access tokens from the refresh tokens used to renew them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    pub token_type: TokenType,
    /// Issued-at, Unix timestamp.
    pub iat: usize,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub.parse::<i64>().map_err(|_| AppError::InvalidToken)
    }
}

fn now_secs() -> Result<usize, AppError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize)
}

/// Signs a token of the given type for a user, valid for `ttl_seconds`.
pub fn sign_token(
    user_id: i64,
    token_type: TokenType,
    secret: &str,
    ttl_seconds: u64,
) -> Result<String, AppError> {
    let now = now_secs()?;
    let claims = Claims {
        sub: user_id.to_string(),
        token_type,
        iat: now,
        exp: now + ttl_seconds as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies a token's signature and expiry and that it is of the `expected` type.
pub fn verify_token(token: &str, expected: TokenType, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::InvalidToken)?;

    if token_data.claims.token_type != expected {
        return Err(AppError::InvalidToken);
    }

    Ok(token_data.claims)
}

/// Axum Middleware: Authentication.
///
/// Resolves the caller into an [`Actor`] and stores it in the request extensions.
/// * No `Authorization: Bearer ...` header: anonymous, the endpoint policy decides.
/// * Valid access token for an existing user: that user, with `is_staff` read fresh
///   from the database.
/// * Anything else: 401 before any handler runs.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let actor = match auth_header.and_then(|header| header.strip_prefix("Bearer ")) {
        None => Actor::Anonymous,
        Some(token) => {
            let claims = verify_token(token.trim(), TokenType::Access, &state.config.jwt_secret)?;
            let user_id = claims.user_id()?;

            let user = sqlx::query_as::<_, (i64, String, bool)>(
                "SELECT id, username, is_staff FROM users WHERE id = ?",
            )
            .bind(user_id)
            .fetch_optional(&state.pool)
            .await?
            .ok_or_else(|| AppError::AuthError("User not found".to_string()))?;

            Actor::User(AuthUser {
                id: user.0,
                username: user.1,
                is_staff: user.2,
            })
        }
    };

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn access_token_round_trip() {
        let token = sign_token(42, TokenType::Access, SECRET, 300).unwrap();
        let claims = verify_token(&token, TokenType::Access, SECRET).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.exp - claims.iat, 300);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let token = sign_token(42, TokenType::Refresh, SECRET, 300).unwrap();
        assert!(matches!(
            verify_token(&token, TokenType::Access, SECRET),
            Err(AppError::InvalidToken)
        ));
        assert!(verify_token(&token, TokenType::Refresh, SECRET).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_token(42, TokenType::Access, SECRET, 300).unwrap();
        assert!(matches!(
            verify_token(&token, TokenType::Access, "other-secret"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = now_secs().unwrap();
        let claims = Claims {
            sub: "42".to_string(),
            token_type: TokenType::Access,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            verify_token(&token, TokenType::Access, SECRET),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            verify_token("invalid_token", TokenType::Access, SECRET),
            Err(AppError::InvalidToken)
        ));
    }
}
