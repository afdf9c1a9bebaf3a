// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    response::Redirect,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{auth, comments, games, genres, studios, users},
    permissions::{Policy, enforce},
    state::AppState,
    utils::jwt::authenticate,
};

/// Genres, studios and games: anyone reads, staff write.
const CATALOG: &[Policy] = &[Policy::AdminOrReadOnly];

/// Favorites and comments: any logged-in user.
const MEMBERS: &[Policy] = &[Policy::Authenticated];

/// Accounts: logged-in users read, staff write.
const ACCOUNTS: &[Policy] = &[Policy::Authenticated, Policy::AdminOrReadOnly];

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * `/register/` and `/api/token/...` are open.
/// * Every other `/api` route runs `authenticate` first, then its policy list.
/// * Global middleware: Trace, CORS.
pub fn create_router(state: AppState) -> Router {
    let token_routes = Router::new()
        .route("/token/", post(auth::obtain_token))
        .route("/token/refresh/", post(auth::refresh_token));

    let catalog_routes = Router::new()
        .route(
            "/genres/",
            get(genres::list_genres).post(genres::create_genre),
        )
        .route(
            "/genres/{id}/",
            get(genres::get_genre)
                .put(genres::update_genre)
                .patch(genres::patch_genre)
                .delete(genres::delete_genre),
        )
        .route(
            "/studios/",
            get(studios::list_studios).post(studios::create_studio),
        )
        .route(
            "/studios/{id}/",
            get(studios::get_studio)
                .put(studios::update_studio)
                .patch(studios::patch_studio)
                .delete(studios::delete_studio),
        )
        .route("/games/", get(games::list_games).post(games::create_game))
        .route(
            "/games/{id}/",
            get(games::get_game)
                .put(games::update_game)
                .patch(games::patch_game)
                .delete(games::delete_game),
        )
        .route_layer(middleware::from_fn_with_state(CATALOG, enforce));

    let member_routes = Router::new()
        .route(
            "/games/{id}/toggle-favorite/",
            post(games::toggle_favorite),
        )
        .route(
            "/comments/",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/comments/{id}/",
            get(comments::get_comment).delete(comments::delete_comment),
        )
        .route_layer(middleware::from_fn_with_state(MEMBERS, enforce));

    let account_routes = Router::new()
        .route("/users/", get(users::list_users).post(users::create_user))
        .route("/users/me/", get(users::me))
        .route(
            "/users/{id}/",
            get(users::get_user)
                .put(users::update_user)
                .patch(users::patch_user)
                .delete(users::delete_user),
        )
        .route_layer(middleware::from_fn_with_state(ACCOUNTS, enforce));

    let protected_routes = Router::new()
        .merge(catalog_routes)
        .merge(member_routes)
        .merge(account_routes)
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let api_routes = Router::new().merge(token_routes).merge(protected_routes);

    Router::new()
        .route("/", get(|| async { Redirect::temporary("/register/") }))
        .route("/register/", post(auth::register))
        .nest("/api", api_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_origins)),
        )
        .with_state(state)
}
