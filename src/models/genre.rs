// src/models/genre.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validate::not_blank;

/// Represents the 'genres' table in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Genre {
    pub id: i64,

    /// Unique display name (e.g., "Action").
    pub name: String,

    pub description: String,
}

/// DTO for creating or fully replacing a genre.
#[derive(Debug, Deserialize, Validate)]
pub struct GenreRequest {
    #[validate(
        required(message = "This field is required."),
        length(max = 100, message = "Ensure this field has no more than 100 characters."),
        custom(function = not_blank)
    )]
    pub name: Option<String>,

    #[validate(
        required(message = "This field is required."),
        custom(function = not_blank)
    )]
    pub description: Option<String>,
}

/// DTO for a partial update. Absent fields keep their stored value.
#[derive(Debug, Deserialize)]
pub struct GenrePatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl GenreRequest {
    pub fn patched(current: &Genre, patch: GenrePatch) -> Self {
        Self {
            name: Some(patch.name.unwrap_or_else(|| current.name.clone())),
            description: Some(
                patch
                    .description
                    .unwrap_or_else(|| current.description.clone()),
            ),
        }
    }
}
