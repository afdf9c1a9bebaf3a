// tests/common/mod.rs

#![allow(dead_code)]

use game_catalog::{config::Config, db, routes, state::AppState};
use serde_json::{Value, json};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

pub const ADMIN_USERNAME: &str = "testadmin123";
pub const ADMIN_PASSWORD: &str = "admin12345";
pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub client: reqwest::Client,
}

/// Spawns the app on a random port against a fresh in-memory database.
pub async fn spawn_app() -> TestApp {
    // One connection: every connection to `sqlite::memory:` is its own database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");

    db::migrate(&pool).await.expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        access_token_ttl: 600,
        refresh_token_ttl: 3600,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        cors_origins: vec!["http://localhost:3000".to_string()],
        rust_log: "error".to_string(),
        log_dir: "logs".to_string(),
        admin_username: Some(ADMIN_USERNAME.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
    };

    db::seed_admin_user(&pool, &config)
        .await
        .expect("Failed to seed admin");

    let state = AppState::new(pool.clone(), config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        pool,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/register/"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn token(&self, username: &str, password: &str) -> String {
        let body: Value = self
            .client
            .post(self.url("/api/token/"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .expect("Failed to parse token json");
        body["access"].as_str().expect("Token not found").to_string()
    }

    /// Registers `username` and returns an access token for it.
    pub async fn login_new_user(&self, username: &str) -> String {
        assert_eq!(self.register(username, PASSWORD).await.status().as_u16(), 201);
        self.token(username, PASSWORD).await
    }

    pub async fn admin_token(&self) -> String {
        self.token(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    pub async fn user_id(&self, username: &str) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// POSTs as `token` and returns the status and parsed body.
    pub async fn post(&self, path: &str, token: &str, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request");
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (u16, Value) {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.expect("Failed to execute request");
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    /// Creates Genre "Action", Studio "Epic Games" (1991) and Game "Fortnite".
    /// Returns (genre_id, studio_id, game_id).
    pub async fn seed_fortnite(&self, admin: &str) -> (i64, i64, i64) {
        let (status, genre) = self
            .post(
                "/api/genres/",
                admin,
                json!({ "name": "Action", "description": "Action games" }),
            )
            .await;
        assert_eq!(status, 201, "{genre}");

        let (status, studio) = self
            .post(
                "/api/studios/",
                admin,
                json!({
                    "name": "Epic Games",
                    "founded_date": "1991-01-01",
                    "description": "Game studio",
                    "country": "USA"
                }),
            )
            .await;
        assert_eq!(status, 201, "{studio}");

        let (status, game) = self
            .post(
                "/api/games/",
                admin,
                json!({
                    "name": "Fortnite",
                    "description": "Battle Royale game",
                    "release_date": "2017-07-25",
                    "studio": studio["id"],
                    "genre": [genre["id"]]
                }),
            )
            .await;
        assert_eq!(status, 201, "{game}");

        (
            genre["id"].as_i64().unwrap(),
            studio["id"].as_i64().unwrap(),
            game["id"].as_i64().unwrap(),
        )
    }
}
