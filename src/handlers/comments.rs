// src/handlers/comments.rs

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    error::AppError,
    models::comment::{Comment, CommentListParams, CreateCommentRequest},
    permissions::{Actor, AuthUser, owner_or_admin},
    utils::extract::{PathId, ValidJson},
};

const COMMENT_COLUMNS: &str = "id, game_id AS game, user_id AS user, text, post_date";

async fn fetch_comment(pool: &SqlitePool, id: i64) -> Result<Comment, AppError> {
    sqlx::query_as::<_, Comment>(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Not found.".to_string()))
}

/// Lists comments, oldest first, optionally for a single game.
/// Requires: Login.
pub async fn list_comments(
    State(pool): State<SqlitePool>,
    Query(params): Query<CommentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {COMMENT_COLUMNS} FROM comments"));
    if let Some(game) = params.game {
        builder.push(" WHERE game_id = ").push_bind(game);
    }
    builder.push(" ORDER BY post_date, id");

    let comments = builder.build_query_as::<Comment>().fetch_all(&pool).await?;
    Ok(Json(comments))
}

/// Posts a comment on a game as the calling user.
/// Requires: Login.
pub async fn create_comment(
    State(pool): State<SqlitePool>,
    user: AuthUser,
    ValidJson(payload): ValidJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let game_id = payload.game.unwrap_or_default();
    let text = payload.text.unwrap_or_default();

    let game = sqlx::query("SELECT 1 FROM games WHERE id = ?")
        .bind(game_id)
        .fetch_optional(&pool)
        .await?;
    if game.is_none() {
        return Err(AppError::field(
            "game",
            format!("Invalid pk \"{}\" - object does not exist.", game_id),
        ));
    }

    let comment = sqlx::query_as::<_, Comment>(&format!(
        r#"
        INSERT INTO comments (user_id, game_id, text, post_date)
        VALUES (?, ?, ?, ?)
        RETURNING {COMMENT_COLUMNS}
        "#
    ))
    .bind(user.id)
    .bind(game_id)
    .bind(text)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create comment: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Retrieves a single comment by ID.
/// Requires: Login.
pub async fn get_comment(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_comment(&pool, id).await?))
}

/// Deletes a comment.
/// Requires: Login + (Author OR Staff).
pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    actor: Actor,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    let comment = fetch_comment(&pool, id).await?;

    if !owner_or_admin(&actor, comment.user) {
        return Err(actor.denied());
    }

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
