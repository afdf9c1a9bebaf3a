// src/handlers/mod.rs

pub mod auth;
pub mod comments;
pub mod games;
pub mod genres;
pub mod studios;
pub mod users;
