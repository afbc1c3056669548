//! Fixtures shared by the unit tests.

use crate::{
    auth::{Actor, AuthKeys},
    db,
    models::{content::ContentKind, draft::ContentDraft, profile::Role},
    services::image_store::ImageStore,
    state::AppState,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub const SECRET: &str = "test-secret";
pub const PUBLIC_URL: &str = "http://localhost:3000";

/// Single-connection in-memory database with the schema applied.
pub async fn memory_db() -> Arc<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    Arc::new(pool)
}

pub async fn image_store() -> (ImageStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = ImageStore::new(memory_db().await, dir.path(), PUBLIC_URL);
    (store, dir)
}

pub async fn app_state() -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = memory_db().await;
    let images = ImageStore::new(db.clone(), dir.path(), PUBLIC_URL);
    (AppState::new(db, images, AuthKeys::from_secret(SECRET)), dir)
}

/// A user with a profile and no role row.
pub async fn user(db: &SqlitePool, username: &str) -> Actor {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO profiles (id, username, created_at) VALUES (?, ?, ?)")
        .bind(id)
        .bind(username)
        .bind(Utc::now())
        .execute(db)
        .await
        .unwrap();
    Actor {
        id,
        email: Some(format!("{username}@example.com")),
    }
}

pub async fn moderator(db: &SqlitePool, username: &str) -> Actor {
    let actor = user(db, username).await;
    sqlx::query("INSERT INTO user_roles (user_id, role, updated_at) VALUES (?, ?, ?)")
        .bind(actor.id)
        .bind(Role::Admin)
        .bind(Utc::now())
        .execute(db)
        .await
        .unwrap();
    actor
}

pub fn token(actor: &Actor) -> String {
    AuthKeys::issue(SECRET, actor.id, actor.email.as_deref())
}

pub fn soup() -> ContentDraft {
    serde_json::from_value(json!({
        "kind": "recipe",
        "title": "Soup",
        "ingredients": ["water"],
        "steps": ["boil"]
    }))
    .unwrap()
}

pub fn planter() -> ContentDraft {
    serde_json::from_value(json!({
        "kind": "packaging_idea",
        "title": "Tin can planter",
        "materials": ["tin can", "gravel"],
        "steps": ["punch drainage holes", "fill with gravel"]
    }))
    .unwrap()
}

pub fn draft_for(kind: ContentKind) -> ContentDraft {
    match kind {
        ContentKind::Recipe => soup(),
        ContentKind::PackagingIdea => planter(),
    }
}
