// src/models/game.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{
    models::{comment::Comment, genre::Genre, studio::Studio},
    utils::validate::not_blank,
};

/// Represents the 'games' table in the database.
/// Genres live in the 'game_genres' join table.
#[derive(Debug, Clone, FromRow)]
pub struct GameRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub release_date: NaiveDate,
    pub studio_id: i64,
}

/// Read representation of a game with its relations expanded.
#[derive(Debug, Clone, Serialize)]
pub struct GameDetail {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub release_date: NaiveDate,
    pub genre: Vec<Genre>,
    pub studio: Studio,
    pub comments: Vec<Comment>,
    /// Number of users who have this game among their favorites.
    pub in_favorites: i64,
}

/// DTO for creating or fully replacing a game. Relations are given as ids.
#[derive(Debug, Deserialize, Validate)]
pub struct GameRequest {
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

    #[validate(required(message = "This field is required."))]
    pub release_date: Option<NaiveDate>,

    #[validate(required(message = "This field is required."))]
    pub studio: Option<i64>,

    /// Genre ids. At least one; duplicates are collapsed.
    #[validate(
        required(message = "This field is required."),
        length(min = 1, message = "This list may not be empty.")
    )]
    pub genre: Option<Vec<i64>>,
}

/// DTO for a partial update.
#[derive(Debug, Deserialize)]
pub struct GamePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub studio: Option<i64>,
    pub genre: Option<Vec<i64>>,
}

impl GameRequest {
    pub fn patched(current: &GameDetail, patch: GamePatch) -> Self {
        Self {
            name: Some(patch.name.unwrap_or_else(|| current.name.clone())),
            description: Some(
                patch
                    .description
                    .unwrap_or_else(|| current.description.clone()),
            ),
            release_date: Some(patch.release_date.unwrap_or(current.release_date)),
            studio: Some(patch.studio.unwrap_or(current.studio.id)),
            genre: Some(
                patch
                    .genre
                    .unwrap_or_else(|| current.genre.iter().map(|g| g.id).collect()),
            ),
        }
    }
}

/// Query parameters for listing games.
#[derive(Debug, Default, Deserialize)]
pub struct GameListParams {
    /// Case-insensitive substring of the game name.
    pub q: Option<String>,
    pub studio: Option<i64>,
    pub genre: Option<i64>,
}
