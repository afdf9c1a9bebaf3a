// src/lib.rs

pub mod config;
pub mod db;
pub mod error;
pub mod favorites;
pub mod handlers;
pub mod models;
pub mod permissions;
pub mod routes;
pub mod state;
pub mod utils;

pub use routes::create_router;
