// src/favorites.rs

//! The user ↔ game favorites relation.
//!
//! A pair is either present or absent. The only mutation besides direct staff edits is
//! [`FavoriteStore::toggle_favorite`], which must flip membership atomically so two
//! concurrent toggles on the same pair cannot both see the same prior state.

use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool, error::ErrorKind};

use crate::error::{AppError, is_constraint};

#[async_trait]
pub trait FavoriteStore: Send + Sync {
    /// Flips membership of `game_id` in the user's favorites and returns the new state:
    /// `true` if the game is now a favorite, `false` if it was removed.
    async fn toggle_favorite(&self, user_id: i64, game_id: i64) -> Result<bool, AppError>;

    async fn is_favorite(&self, user_id: i64, game_id: i64) -> Result<bool, AppError>;

    /// Ids of the user's favorite games, ascending.
    async fn favorite_game_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError>;
}

#[async_trait]
impl FavoriteStore for SqlitePool {
    async fn toggle_favorite(&self, user_id: i64, game_id: i64) -> Result<bool, AppError> {
        let mut tx = self.begin().await?;

        // Deleting first makes the opening statement a write, so the transaction holds
        // the write lock before it learns the prior state.
        let removed = sqlx::query("DELETE FROM favorite_games WHERE user_id = ? AND game_id = ?")
            .bind(user_id)
            .bind(game_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            sqlx::query("INSERT INTO favorite_games (user_id, game_id) VALUES (?, ?)")
                .bind(user_id)
                .bind(game_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if is_constraint(&e, ErrorKind::ForeignKeyViolation) {
                        AppError::NotFound("Not found.".to_string())
                    } else {
                        AppError::from(e)
                    }
                })?;
        }

        tx.commit().await?;

        let is_favorite = removed == 0;
        tracing::debug!(user_id, game_id, is_favorite, "favorite toggled");
        Ok(is_favorite)
    }

    async fn is_favorite(&self, user_id: i64, game_id: i64) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT 1 FROM favorite_games WHERE user_id = ? AND game_id = ?")
            .bind(user_id)
            .bind(game_id)
            .fetch_optional(self)
            .await?;
        Ok(row.is_some())
    }

    async fn favorite_game_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let mut conn = self.acquire().await?;
        favorite_game_ids(&mut conn, user_id).await
    }
}

/// Same as [`FavoriteStore::favorite_game_ids`], usable inside an open transaction.
pub async fn favorite_game_ids(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<i64>, AppError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT game_id FROM favorite_games WHERE user_id = ? ORDER BY game_id",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

/// Replaces a user's whole favorites set. Staff-only direct edit.
///
/// Unknown game ids are rejected as a field error before anything is written.
pub async fn replace_favorites(
    conn: &mut SqliteConnection,
    user_id: i64,
    game_ids: &[i64],
) -> Result<(), AppError> {
    let mut ids = game_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    for id in &ids {
        let exists = sqlx::query("SELECT 1 FROM games WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() {
            return Err(AppError::field(
                "favorite_games",
                format!("Invalid pk \"{}\" - object does not exist.", id),
            ));
        }
    }

    sqlx::query("DELETE FROM favorite_games WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    for id in ids {
        sqlx::query("INSERT INTO favorite_games (user_id, game_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, path::PathBuf, sync::Arc, sync::Mutex};

    use sqlx::sqlite::SqlitePoolOptions;

    use crate::db;

    use super::*;

    /// In-process stand-in with the same contract.
    #[derive(Default)]
    struct MemoryFavorites {
        rows: Mutex<BTreeSet<(i64, i64)>>,
    }

    #[async_trait]
    impl FavoriteStore for MemoryFavorites {
        async fn toggle_favorite(&self, user_id: i64, game_id: i64) -> Result<bool, AppError> {
            let mut rows = self.rows.lock().unwrap();
            if rows.remove(&(user_id, game_id)) {
                Ok(false)
            } else {
                rows.insert((user_id, game_id));
                Ok(true)
            }
        }

        async fn is_favorite(&self, user_id: i64, game_id: i64) -> Result<bool, AppError> {
            Ok(self.rows.lock().unwrap().contains(&(user_id, game_id)))
        }

        async fn favorite_game_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|(u, _)| *u == user_id)
                .map(|(_, g)| *g)
                .collect())
        }
    }

    async fn assert_toggle_contract(store: &dyn FavoriteStore, user: i64, game: i64) {
        assert!(!store.is_favorite(user, game).await.unwrap());

        assert!(store.toggle_favorite(user, game).await.unwrap());
        assert!(store.is_favorite(user, game).await.unwrap());
        assert_eq!(store.favorite_game_ids(user).await.unwrap(), vec![game]);

        assert!(!store.toggle_favorite(user, game).await.unwrap());
        assert!(!store.is_favorite(user, game).await.unwrap());
        assert!(store.favorite_game_ids(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_store_toggles() {
        assert_toggle_contract(&MemoryFavorites::default(), 1, 10).await;
    }

    #[tokio::test]
    async fn even_number_of_concurrent_toggles_restores_state() {
        let store = Arc::new(MemoryFavorites::default());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.toggle_favorite(1, 10).await.unwrap() })
            })
            .collect();

        let mut added = 0;
        for handle in handles {
            if handle.await.unwrap() {
                added += 1;
            }
        }

        assert_eq!(added, 8);
        assert!(!store.is_favorite(1, 10).await.unwrap());
    }

    async fn sqlite_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    async fn seed_user_and_game(pool: &SqlitePool) -> (i64, i64) {
        let user_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, password, date_joined) VALUES ('alice', 'x', '2024-01-01T00:00:00Z') RETURNING id",
        )
        .fetch_one(pool)
        .await
        .unwrap();
        let studio_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO studios (name, founded_date, country) VALUES ('Epic Games', '1991-01-01', 'USA') RETURNING id",
        )
        .fetch_one(pool)
        .await
        .unwrap();
        let game_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO games (name, release_date, studio_id) VALUES ('Fortnite', '2017-07-25', ?) RETURNING id",
        )
        .bind(studio_id)
        .fetch_one(pool)
        .await
        .unwrap();
        (user_id, game_id)
    }

    #[tokio::test]
    async fn sqlite_store_toggles() {
        let pool = sqlite_pool().await;
        let (user, game) = seed_user_and_game(&pool).await;
        assert_toggle_contract(&pool, user, game).await;
    }

    #[tokio::test]
    async fn sqlite_toggle_on_missing_game_is_not_found() {
        let pool = sqlite_pool().await;
        let (user, _) = seed_user_and_game(&pool).await;
        assert!(matches!(
            pool.toggle_favorite(user, 9999).await,
            Err(AppError::NotFound(_))
        ));
        assert!(pool.favorite_game_ids(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_rejects_unknown_games_without_writing() {
        let pool = sqlite_pool().await;
        let (user, game) = seed_user_and_game(&pool).await;
        pool.toggle_favorite(user, game).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let result = replace_favorites(&mut conn, user, &[game, 4242]).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(favorite_game_ids(&mut conn, user).await.unwrap(), vec![game]);

        replace_favorites(&mut conn, user, &[]).await.unwrap();
        assert!(favorite_game_ids(&mut conn, user).await.unwrap().is_empty());
    }

    /// Database file in the temp dir, removed (with its journal files) on drop.
    struct TempDb(PathBuf);

    impl TempDb {
        fn new(name: &str) -> Self {
            let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
            Self(std::env::temp_dir().join(format!(
                "{}_{}_{}.db",
                name,
                std::process::id(),
                nanos
            )))
        }

        fn url(&self) -> String {
            format!("sqlite://{}", self.0.display())
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            for suffix in ["", "-wal", "-shm", "-journal"] {
                let mut path = self.0.clone().into_os_string();
                path.push(suffix);
                let _ = std::fs::remove_file(path);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_toggles_on_a_shared_database_never_double_apply() {
        let file = TempDb::new("favorites_toggle");
        let pool = db::connect(&file.url()).await.unwrap();
        db::migrate(&pool).await.unwrap();
        let (user, game) = seed_user_and_game(&pool).await;

        const TOGGLES: usize = 40;
        let handles: Vec<_> = (0..TOGGLES)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.toggle_favorite(user, game).await })
            })
            .collect();

        let mut added = 0;
        let mut errors = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(e) => errors.push(e),
            }
        }

        let rows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM favorite_games WHERE user_id = ? AND game_id = ?",
        )
        .bind(user)
        .bind(game)
        .fetch_one(&pool)
        .await
        .unwrap();
        pool.close().await;

        assert!(errors.is_empty(), "toggles failed: {errors:?}");
        assert_eq!(added, TOGGLES / 2);
        assert_eq!(rows, 0);
    }
}
