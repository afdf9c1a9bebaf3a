// src/state.rs

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::config::Config;

/// Shared by every handler. Handlers extract the part they need
/// (`State<SqlitePool>` or `State<Config>`) rather than the whole struct.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        Self { pool, config }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
