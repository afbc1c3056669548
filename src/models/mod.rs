//! Core data models for the recipe and packaging-idea exchange.
//!
//! These map to SQLite rows via `sqlx::FromRow` and serialize as JSON via
//! `serde`. Lifecycle rules that need no storage live next to the types.

pub mod content;
pub mod draft;
pub mod image;
pub mod profile;
pub mod report;
