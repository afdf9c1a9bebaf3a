// src/handlers/genres.rs

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{SqlitePool, error::ErrorKind};
use validator::Validate;

use crate::{
    error::{AppError, is_constraint},
    models::genre::{Genre, GenrePatch, GenreRequest},
    utils::extract::{JsonBody, PathId, ValidJson},
};

fn name_conflict(e: sqlx::Error) -> AppError {
    if is_constraint(&e, ErrorKind::UniqueViolation) {
        AppError::field("name", "genre with this name already exists.")
    } else {
        tracing::error!("Failed to write genre: {:?}", e);
        AppError::from(e)
    }
}

async fn fetch_genre(pool: &SqlitePool, id: i64) -> Result<Genre, AppError> {
    sqlx::query_as::<_, Genre>("SELECT id, name, description FROM genres WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".to_string()))
}

/// Lists all genres.
pub async fn list_genres(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let genres = sqlx::query_as::<_, Genre>("SELECT id, name, description FROM genres ORDER BY id")
        .fetch_all(&pool)
        .await?;

    Ok(Json(genres))
}

/// Retrieves a single genre by ID.
pub async fn get_genre(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_genre(&pool, id).await?))
}

/// Creates a genre.
/// Admin only.
pub async fn create_genre(
    State(pool): State<SqlitePool>,
    ValidJson(payload): ValidJson<GenreRequest>,
) -> Result<impl IntoResponse, AppError> {
    let genre = sqlx::query_as::<_, Genre>(
        "INSERT INTO genres (name, description) VALUES (?, ?) RETURNING id, name, description",
    )
    .bind(payload.name.unwrap_or_default())
    .bind(payload.description.unwrap_or_default())
    .fetch_one(&pool)
    .await
    .map_err(name_conflict)?;

    Ok((StatusCode::CREATED, Json(genre)))
}

/// Replaces a genre.
/// Admin only.
pub async fn update_genre(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<GenreRequest>,
) -> Result<impl IntoResponse, AppError> {
    fetch_genre(&pool, id).await?;
    payload.validate()?;
    save_genre(&pool, id, payload).await
}

/// Partially updates a genre.
/// Admin only.
pub async fn patch_genre(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
    JsonBody(patch): JsonBody<GenrePatch>,
) -> Result<impl IntoResponse, AppError> {
    let current = fetch_genre(&pool, id).await?;
    let payload = GenreRequest::patched(&current, patch);
    payload.validate()?;
    save_genre(&pool, id, payload).await
}

async fn save_genre(
    pool: &SqlitePool,
    id: i64,
    payload: GenreRequest,
) -> Result<Json<Genre>, AppError> {
    let genre = sqlx::query_as::<_, Genre>(
        "UPDATE genres SET name = ?, description = ? WHERE id = ? RETURNING id, name, description",
    )
    .bind(payload.name.unwrap_or_default())
    .bind(payload.description.unwrap_or_default())
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(name_conflict)?
    .ok_or_else(|| AppError::NotFound("Not found.".to_string()))?;

    Ok(Json(genre))
}

/// Deletes a genre. Games keep existing, they just lose the tag.
/// Admin only.
pub async fn delete_genre(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM genres WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Not found.".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
