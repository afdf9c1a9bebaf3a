// src/models/comment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validate::not_blank;

/// Represents the 'comments' table in the database.
/// Selected with `game_id AS game, user_id AS user` so the row is also the API shape.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub game: i64,
    pub user: i64,
    pub text: String,
    /// Assigned by the server on insert, never updated.
    pub post_date: DateTime<Utc>,
}

/// DTO for creating a new comment. The author comes from the credential.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(required(message = "This field is required."))]
    pub game: Option<i64>,

    /// Stored exactly as sent.
    #[validate(
        required(message = "This field is required."),
        custom(function = not_blank)
    )]
    pub text: Option<String>,
}

/// Query parameters for listing comments.
#[derive(Debug, Deserialize)]
pub struct CommentListParams {
    pub game: Option<i64>,
}
