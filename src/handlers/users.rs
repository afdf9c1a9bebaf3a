// src/handlers/users.rs

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{SqliteConnection, SqlitePool, error::ErrorKind};
use validator::Validate;

use crate::{
    error::{AppError, is_constraint},
    favorites::{FavoriteStore, replace_favorites},
    models::user::{User, UserPatch, UserRequest, UserView, ViewShape, view_shape},
    permissions::{Actor, AuthUser, owner_or_admin},
    utils::{
        extract::{JsonBody, PathId, ValidJson},
        hash::hash_password,
        validate::REQUIRED,
    },
};

pub const USER_COLUMNS: &str =
    "id, username, password, email, first_name, last_name, is_staff, date_joined";

/// Maps a duplicate username to a field error; anything else passes through.
pub fn username_conflict(e: sqlx::Error) -> AppError {
    if is_constraint(&e, ErrorKind::UniqueViolation) {
        AppError::field("username", "A user with that username already exists.")
    } else {
        tracing::error!("Failed to write user: {:?}", e);
        AppError::from(e)
    }
}

async fn fetch_user(pool: &SqlitePool, id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".to_string()))
}

async fn render(pool: &SqlitePool, shape: ViewShape, user: User) -> Result<UserView, AppError> {
    let favorite_games = pool.favorite_game_ids(user.id).await?;
    Ok(UserView::render(shape, user, favorite_games))
}

/// Lists accounts. Staff see everyone in the extended shape; other users see only
/// their own record, in the short shape.
pub async fn list_users(
    State(pool): State<SqlitePool>,
    actor: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let users = if actor.is_staff {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&pool)
            .await?
    } else {
        vec![fetch_user(&pool, actor.id).await?]
    };

    let shape = view_shape(actor.is_staff);
    let mut views = Vec::with_capacity(users.len());
    for user in users {
        views.push(render(&pool, shape, user).await?);
    }

    Ok(Json(views))
}

/// Retrieves one account: yourself, or anyone if you are staff.
pub async fn get_user(
    State(pool): State<SqlitePool>,
    actor: Actor,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    if !owner_or_admin(&actor, id) {
        return Err(actor.denied());
    }

    let user = fetch_user(&pool, id).await?;
    Ok(Json(render(&pool, view_shape(actor.is_staff()), user).await?))
}

/// The caller's own extended profile.
pub async fn me(
    State(pool): State<SqlitePool>,
    actor: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = fetch_user(&pool, actor.id).await?;
    Ok(Json(render(&pool, ViewShape::Extended, user).await?))
}

/// Creates an account with any role.
/// Admin only.
pub async fn create_user(
    State(pool): State<SqlitePool>,
    ValidJson(payload): ValidJson<UserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let Some(password) = payload.password.as_deref() else {
        return Err(AppError::field("password", REQUIRED));
    };
    let hashed_password = hash_password(password)?;

    let mut tx = pool.begin().await?;

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO users (username, password, email, first_name, last_name, is_staff, date_joined)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(payload.username.as_deref().unwrap_or_default())
    .bind(hashed_password)
    .bind(&payload.email)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(payload.is_staff)
    .bind(chrono::Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(username_conflict)?;

    if let Some(game_ids) = &payload.favorite_games {
        replace_favorites(&mut tx, id, game_ids).await?;
    }

    tx.commit().await?;
    tracing::info!(user_id = id, is_staff = payload.is_staff, "staff created user");

    let user = fetch_user(&pool, id).await?;
    Ok((
        StatusCode::CREATED,
        Json(render(&pool, ViewShape::Extended, user).await?),
    ))
}

/// Replaces an account's fields. `password` and `favorite_games` are only
/// changed when present.
/// Admin only.
pub async fn update_user(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<UserRequest>,
) -> Result<impl IntoResponse, AppError> {
    fetch_user(&pool, id).await?;
    payload.validate()?;
    save_user(&pool, id, payload).await
}

/// Partially updates an account.
/// Admin only.
pub async fn patch_user(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
    JsonBody(patch): JsonBody<UserPatch>,
) -> Result<impl IntoResponse, AppError> {
    let current = fetch_user(&pool, id).await?;
    let payload = UserRequest::patched(&current, patch);
    payload.validate()?;
    save_user(&pool, id, payload).await
}

async fn save_user(
    pool: &SqlitePool,
    id: i64,
    payload: UserRequest,
) -> Result<Json<UserView>, AppError> {
    // Hash before opening the transaction; it is the slow part.
    let hashed_password = payload.password.as_deref().map(hash_password).transpose()?;

    let mut tx = pool.begin().await?;
    write_user(&mut tx, id, &payload, hashed_password.as_deref()).await?;
    tx.commit().await?;

    let user = fetch_user(pool, id).await?;
    Ok(Json(render(pool, ViewShape::Extended, user).await?))
}

async fn write_user(
    conn: &mut SqliteConnection,
    id: i64,
    payload: &UserRequest,
    hashed_password: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE users
        SET username = ?, email = ?, first_name = ?, last_name = ?, is_staff = ?
        WHERE id = ?
        "#,
    )
    .bind(payload.username.as_deref().unwrap_or_default())
    .bind(&payload.email)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(payload.is_staff)
    .bind(id)
    .execute(&mut *conn)
    .await
    .map_err(username_conflict)?;

    if let Some(hashed) = hashed_password {
        sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(hashed)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }

    if let Some(game_ids) = &payload.favorite_games {
        replace_favorites(conn, id, game_ids).await?;
    }

    Ok(())
}

/// Deletes an account together with its comments and favorites.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<SqlitePool>,
    actor: AuthUser,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    if id == actor.id {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Not found.".to_string()));
    }

    tracing::info!(user_id = id, deleted_by = actor.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
