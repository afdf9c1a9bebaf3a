// src/handlers/studios.rs

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::studio::{Studio, StudioPatch, StudioRequest},
    utils::extract::{JsonBody, PathId, ValidJson},
};

const STUDIO_COLUMNS: &str = "id, name, founded_date, description, country";

async fn fetch_studio(pool: &SqlitePool, id: i64) -> Result<Studio, AppError> {
    sqlx::query_as::<_, Studio>(&format!("SELECT {STUDIO_COLUMNS} FROM studios WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".to_string()))
}

/// Lists all studios.
pub async fn list_studios(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let studios =
        sqlx::query_as::<_, Studio>(&format!("SELECT {STUDIO_COLUMNS} FROM studios ORDER BY id"))
            .fetch_all(&pool)
            .await?;

    Ok(Json(studios))
}

/// Retrieves a single studio by ID.
pub async fn get_studio(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_studio(&pool, id).await?))
}

/// Creates a studio.
/// Admin only.
pub async fn create_studio(
    State(pool): State<SqlitePool>,
    ValidJson(payload): ValidJson<StudioRequest>,
) -> Result<impl IntoResponse, AppError> {
    let studio = sqlx::query_as::<_, Studio>(&format!(
        r#"
        INSERT INTO studios (name, founded_date, description, country)
        VALUES (?, ?, ?, ?)
        RETURNING {STUDIO_COLUMNS}
        "#
    ))
    .bind(payload.name.unwrap_or_default())
    .bind(payload.founded_date)
    .bind(payload.description.unwrap_or_default())
    .bind(payload.country.unwrap_or_default())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create studio: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(studio)))
}

/// Replaces a studio.
/// Admin only.
pub async fn update_studio(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<StudioRequest>,
) -> Result<impl IntoResponse, AppError> {
    fetch_studio(&pool, id).await?;
    payload.validate()?;
    save_studio(&pool, id, payload).await
}

/// Partially updates a studio.
/// Admin only.
pub async fn patch_studio(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
    JsonBody(patch): JsonBody<StudioPatch>,
) -> Result<impl IntoResponse, AppError> {
    let current = fetch_studio(&pool, id).await?;
    let payload = StudioRequest::patched(&current, patch);
    payload.validate()?;
    save_studio(&pool, id, payload).await
}

async fn save_studio(
    pool: &SqlitePool,
    id: i64,
    payload: StudioRequest,
) -> Result<Json<Studio>, AppError> {
    let studio = sqlx::query_as::<_, Studio>(&format!(
        r#"
        UPDATE studios
        SET name = ?, founded_date = ?, description = ?, country = ?
        WHERE id = ?
        RETURNING {STUDIO_COLUMNS}
        "#
    ))
    .bind(payload.name.unwrap_or_default())
    .bind(payload.founded_date)
    .bind(payload.description.unwrap_or_default())
    .bind(payload.country.unwrap_or_default())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Not found.".to_string()))?;

    Ok(Json(studio))
}

/// Deletes a studio and, through the foreign key cascade, every game it owns.
/// Admin only.
pub async fn delete_studio(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM studios WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete studio: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Not found.".to_string()));
    }

    tracing::info!(studio_id = id, "studio deleted with its games");
    Ok(StatusCode::NO_CONTENT)
}
