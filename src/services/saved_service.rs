//! Per-user bookmarks on content items.

use super::{
    ServiceResult,
    access_service::AccessService,
    content_service::{ensure_visible, fetch_item},
};
use crate::{
    auth::Actor,
    models::content::{ContentKind, ContentStatus, ContentView},
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct SavedService {
    db: Arc<SqlitePool>,
    access: AccessService,
}

impl SavedService {
    pub fn new(db: Arc<SqlitePool>, access: AccessService) -> Self {
        Self { db, access }
    }

    /// Idempotent; saving twice keeps a single relation. Only items the
    /// caller can see may be saved.
    pub async fn save(&self, actor: &Actor, kind: ContentKind, content_id: Uuid) -> ServiceResult<()> {
        let item = fetch_item(&self.db, kind, content_id).await?;
        ensure_visible(&self.access, Some(actor), &item).await?;
        let result = sqlx::query(
            "INSERT INTO saved_items (user_id, content_id, content_kind, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id, content_id) DO NOTHING",
        )
        .bind(actor.id)
        .bind(content_id)
        .bind(kind)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;
        debug!(user = %actor.id, %content_id, inserted = result.rows_affected(), "saved");
        Ok(())
    }

    /// Idempotent; unsaving something never saved is not an error.
    pub async fn unsave(&self, actor: &Actor, kind: ContentKind, content_id: Uuid) -> ServiceResult<()> {
        sqlx::query("DELETE FROM saved_items WHERE user_id = ? AND content_id = ? AND content_kind = ?")
            .bind(actor.id)
            .bind(content_id)
            .bind(kind)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    pub async fn is_saved(&self, actor: &Actor, kind: ContentKind, content_id: Uuid) -> ServiceResult<bool> {
        let saved = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM saved_items WHERE user_id = ? AND content_id = ? AND content_kind = ?)",
        )
        .bind(actor.id)
        .bind(content_id)
        .bind(kind)
        .fetch_one(&*self.db)
        .await?;
        Ok(saved)
    }

    /// Saved items of `kind` that are currently approved, most recently
    /// saved first. Relations to items that left `approved` stay stored and
    /// reappear if the item is approved again.
    pub async fn list_saved(&self, actor: &Actor, kind: ContentKind) -> ServiceResult<Vec<ContentView>> {
        let items = sqlx::query_as::<_, ContentView>(view_select!(
            "JOIN saved_items s ON s.content_id = c.id \
             WHERE s.user_id = ? AND c.kind = ? AND c.status = ? \
             ORDER BY s.created_at DESC, s.rowid DESC"
        ))
        .bind(actor.id)
        .bind(kind)
        .bind(ContentStatus::Approved)
        .fetch_all(&*self.db)
        .await?;
        Ok(items)
    }
}
