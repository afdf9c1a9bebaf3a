// src/models/mod.rs

pub mod comment;
pub mod game;
pub mod genre;
pub mod studio;
pub mod user;
