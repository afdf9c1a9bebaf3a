// src/handlers/games.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    favorites::FavoriteStore,
    models::{
        comment::Comment,
        game::{GameDetail, GameListParams, GamePatch, GameRequest, GameRow},
        genre::Genre,
        studio::Studio,
        user::{ToggleFavoriteResponse, UserShort},
    },
    permissions::AuthUser,
    utils::extract::{JsonBody, PathId, ValidJson},
};

/// A genre row tagged with the game it is attached to.
#[derive(FromRow)]
struct GameGenre {
    game_id: i64,
    #[sqlx(flatten)]
    genre: Genre,
}

fn push_ids(builder: &mut QueryBuilder<'_, Sqlite>, ids: impl IntoIterator<Item = i64>) {
    builder.push(" (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    builder.push(")");
}

/// `LIKE` pattern matching `q` anywhere, with `q` itself taken literally.
fn contains_pattern(q: &str) -> String {
    let escaped = q
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Loads games matching the filters, with studio, genres, comments and favorite
/// counts attached. Five queries regardless of how many games match.
async fn load_games(
    pool: &SqlitePool,
    only: Option<i64>,
    params: &GameListParams,
) -> Result<Vec<GameDetail>, AppError> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, name, description, release_date, studio_id FROM games WHERE 1 = 1",
    );
    if let Some(id) = only {
        builder.push(" AND id = ").push_bind(id);
    }
    if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        builder
            .push(" AND name LIKE ")
            .push_bind(contains_pattern(q))
            .push(" ESCAPE '\\'");
    }
    if let Some(studio) = params.studio {
        builder.push(" AND studio_id = ").push_bind(studio);
    }
    if let Some(genre) = params.genre {
        builder
            .push(" AND EXISTS (SELECT 1 FROM game_genres gg WHERE gg.game_id = games.id AND gg.genre_id = ")
            .push_bind(genre)
            .push(")");
    }
    builder.push(" ORDER BY id");

    let rows: Vec<GameRow> = builder.build_query_as().fetch_all(pool).await?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let game_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, name, founded_date, description, country FROM studios WHERE id IN",
    );
    push_ids(&mut builder, rows.iter().map(|row| row.studio_id));
    let studios: HashMap<i64, Studio> = builder
        .build_query_as::<Studio>()
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|studio| (studio.id, studio))
        .collect();

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT gg.game_id, g.id, g.name, g.description
        FROM game_genres gg
        JOIN genres g ON g.id = gg.genre_id
        WHERE gg.game_id IN"#,
    );
    push_ids(&mut builder, game_ids.iter().copied());
    builder.push(" ORDER BY g.id");
    let mut genres: HashMap<i64, Vec<Genre>> = HashMap::new();
    for row in builder.build_query_as::<GameGenre>().fetch_all(pool).await? {
        genres.entry(row.game_id).or_default().push(row.genre);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, game_id AS game, user_id AS user, text, post_date FROM comments WHERE game_id IN",
    );
    push_ids(&mut builder, game_ids.iter().copied());
    builder.push(" ORDER BY post_date, id");
    let mut comments: HashMap<i64, Vec<Comment>> = HashMap::new();
    for comment in builder.build_query_as::<Comment>().fetch_all(pool).await? {
        comments.entry(comment.game).or_default().push(comment);
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT game_id, COUNT(*) FROM favorite_games WHERE game_id IN");
    push_ids(&mut builder, game_ids.iter().copied());
    builder.push(" GROUP BY game_id");
    let in_favorites: HashMap<i64, i64> = builder
        .build_query_as::<(i64, i64)>()
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();

    rows.into_iter()
        .map(|row| {
            let studio = studios.get(&row.studio_id).cloned().ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "game {} references missing studio {}",
                    row.id, row.studio_id
                ))
            })?;
            Ok(GameDetail {
                id: row.id,
                name: row.name,
                description: row.description,
                release_date: row.release_date,
                genre: genres.remove(&row.id).unwrap_or_default(),
                studio,
                comments: comments.remove(&row.id).unwrap_or_default(),
                in_favorites: in_favorites.get(&row.id).copied().unwrap_or(0),
            })
        })
        .collect()
}

async fn load_game(pool: &SqlitePool, id: i64) -> Result<GameDetail, AppError> {
    load_games(pool, Some(id), &GameListParams::default())
        .await?
        .pop()
        .ok_or_else(|| AppError::NotFound("Not found.".to_string()))
}

async fn game_exists(pool: &SqlitePool, id: i64) -> Result<bool, AppError> {
    let row = sqlx::query("SELECT 1 FROM games WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

fn invalid_pk(field: &'static str, id: i64) -> AppError {
    AppError::field(field, format!("Invalid pk \"{}\" - object does not exist.", id))
}

/// Resolves the studio and genre ids of a write request.
/// Returns the studio id and the de-duplicated genre ids.
async fn check_references(
    conn: &mut SqliteConnection,
    payload: &GameRequest,
) -> Result<(i64, Vec<i64>), AppError> {
    let studio_id = payload.studio.unwrap_or_default();
    let studio = sqlx::query("SELECT 1 FROM studios WHERE id = ?")
        .bind(studio_id)
        .fetch_optional(&mut *conn)
        .await?;
    if studio.is_none() {
        return Err(invalid_pk("studio", studio_id));
    }

    let mut genre_ids = payload.genre.clone().unwrap_or_default();
    genre_ids.sort_unstable();
    genre_ids.dedup();
    for id in &genre_ids {
        let genre = sqlx::query("SELECT 1 FROM genres WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        if genre.is_none() {
            return Err(invalid_pk("genre", *id));
        }
    }

    Ok((studio_id, genre_ids))
}

async fn write_genres(
    conn: &mut SqliteConnection,
    game_id: i64,
    genre_ids: &[i64],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM game_genres WHERE game_id = ?")
        .bind(game_id)
        .execute(&mut *conn)
        .await?;

    for genre_id in genre_ids {
        sqlx::query("INSERT INTO game_genres (game_id, genre_id) VALUES (?, ?)")
            .bind(game_id)
            .bind(genre_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Lists games, optionally filtered by name, studio or genre.
pub async fn list_games(
    State(pool): State<SqlitePool>,
    Query(params): Query<GameListParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(load_games(&pool, None, &params).await?))
}

/// Retrieves a single game by ID.
pub async fn get_game(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(load_game(&pool, id).await?))
}

/// Creates a game from flat studio/genre ids.
/// Admin only.
pub async fn create_game(
    State(pool): State<SqlitePool>,
    ValidJson(payload): ValidJson<GameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;
    let (studio_id, genre_ids) = check_references(&mut tx, &payload).await?;

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO games (name, description, release_date, studio_id)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(payload.name.as_deref().unwrap_or_default())
    .bind(payload.description.as_deref().unwrap_or_default())
    .bind(payload.release_date)
    .bind(studio_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create game: {:?}", e);
        AppError::from(e)
    })?;

    write_genres(&mut tx, id, &genre_ids).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(load_game(&pool, id).await?)))
}

/// Replaces a game.
/// Admin only.
pub async fn update_game(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<GameRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !game_exists(&pool, id).await? {
        return Err(AppError::NotFound("Not found.".to_string()));
    }
    payload.validate()?;
    save_game(&pool, id, payload).await
}

/// Partially updates a game.
/// Admin only.
pub async fn patch_game(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
    JsonBody(patch): JsonBody<GamePatch>,
) -> Result<impl IntoResponse, AppError> {
    let current = load_game(&pool, id).await?;
    let payload = GameRequest::patched(&current, patch);
    payload.validate()?;
    save_game(&pool, id, payload).await
}

async fn save_game(
    pool: &SqlitePool,
    id: i64,
    payload: GameRequest,
) -> Result<Json<GameDetail>, AppError> {
    let mut tx = pool.begin().await?;
    let (studio_id, genre_ids) = check_references(&mut tx, &payload).await?;

    let result = sqlx::query(
        r#"
        UPDATE games
        SET name = ?, description = ?, release_date = ?, studio_id = ?
        WHERE id = ?
        "#,
    )
    .bind(payload.name.as_deref().unwrap_or_default())
    .bind(payload.description.as_deref().unwrap_or_default())
    .bind(payload.release_date)
    .bind(studio_id)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Not found.".to_string()));
    }

    write_genres(&mut tx, id, &genre_ids).await?;
    tx.commit().await?;

    Ok(Json(load_game(pool, id).await?))
}

/// Deletes a game; its comments and favorite entries go with it.
/// Admin only.
pub async fn delete_game(
    State(pool): State<SqlitePool>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM games WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete game: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Not found.".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Adds the game to the caller's favorites, or removes it if already there.
/// Requires: Login.
pub async fn toggle_favorite(
    State(pool): State<SqlitePool>,
    user: AuthUser,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    if !game_exists(&pool, id).await? {
        return Err(AppError::NotFound("Not found.".to_string()));
    }

    let is_favorite = pool.toggle_favorite(user.id, id).await?;
    let favorite_games = pool.favorite_game_ids(user.id).await?;

    Ok(Json(ToggleFavoriteResponse {
        is_favorite,
        user: UserShort {
            username: user.username,
            favorite_games,
        },
    }))
}
