//! Moderator side of the content lifecycle: the pending queue, approve/reject
//! decisions and the decision log.

use super::{
    ServiceError, ServiceResult, access_service::AccessService, content_service::fetch_item,
};
use crate::{
    auth::Actor,
    models::content::{
        ContentItem, ContentKind, ContentStatus, ContentView, Decision, ModerationDecision,
    },
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct ModerationService {
    db: Arc<SqlitePool>,
    access: AccessService,
}

impl ModerationService {
    pub fn new(db: Arc<SqlitePool>, access: AccessService) -> Self {
        Self { db, access }
    }

    /// Items of `kind` awaiting a decision, oldest submission first.
    pub async fn pending_queue(
        &self,
        actor: &Actor,
        kind: ContentKind,
    ) -> ServiceResult<Vec<ContentView>> {
        self.access.require_moderator(actor).await?;
        let items = sqlx::query_as::<_, ContentView>(view_select!(
            "WHERE c.kind = ? AND c.status = ? ORDER BY c.created_at ASC, c.rowid ASC"
        ))
        .bind(kind)
        .bind(ContentStatus::Pending)
        .fetch_all(&*self.db)
        .await?;
        Ok(items)
    }

    pub async fn approve(
        &self,
        actor: &Actor,
        kind: ContentKind,
        id: Uuid,
        notes: Option<String>,
    ) -> ServiceResult<ContentItem> {
        self.decide(actor, kind, id, Decision::Approved, notes).await
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        kind: ContentKind,
        id: Uuid,
        notes: Option<String>,
    ) -> ServiceResult<ContentItem> {
        self.decide(actor, kind, id, Decision::Rejected, notes).await
    }

    /// Move a pending item to the decision's status.
    ///
    /// The status guard is checked up front and again inside the UPDATE, so
    /// of two moderators deciding on the same item only one write matches;
    /// the other gets `InvalidStateTransition`. The log entry commits with
    /// the update.
    async fn decide(
        &self,
        actor: &Actor,
        kind: ContentKind,
        id: Uuid,
        decision: Decision,
        notes: Option<String>,
    ) -> ServiceResult<ContentItem> {
        self.access.require_moderator(actor).await?;

        let current = fetch_item(&self.db, kind, id).await?;
        if !decision.transition().accepts_origin(current.status) {
            return Err(not_pending(kind, id, current.status));
        }

        let notes = notes.unwrap_or_default();
        let now = Utc::now();

        let mut tx = self.db.begin().await?;
        let updated = sqlx::query_as::<_, ContentItem>(concat!(
            "UPDATE content_items SET status = ?, approved_at = ?, moderator_notes = ?, updated_at = ? \
             WHERE id = ? AND kind = ? AND status = ? RETURNING ",
            item_columns!()
        ))
        .bind(decision.status())
        .bind(decision.approved_at(now))
        .bind(&notes)
        .bind(now)
        .bind(id)
        .bind(kind)
        .bind(ContentStatus::Pending)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(item) = updated else {
            // another decision landed between the check and the write
            tx.rollback().await?;
            let current = fetch_item(&self.db, kind, id).await?;
            return Err(not_pending(kind, id, current.status));
        };

        sqlx::query(
            "INSERT INTO moderation_decisions (id, content_id, moderator_id, decision, notes, decided_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(actor.id)
        .bind(decision)
        .bind(&notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(moderator = %actor.id, %id, %kind, ?decision, "moderation decision recorded");
        Ok(item)
    }

    /// Every decision ever taken on the item, oldest first.
    pub async fn history(
        &self,
        actor: &Actor,
        kind: ContentKind,
        id: Uuid,
    ) -> ServiceResult<Vec<ModerationDecision>> {
        self.access.require_moderator(actor).await?;
        fetch_item(&self.db, kind, id).await?;
        let decisions = sqlx::query_as::<_, ModerationDecision>(
            "SELECT d.id, d.content_id, d.moderator_id, p.username AS moderator_username,
                    d.decision, d.notes, d.decided_at
             FROM moderation_decisions d
             LEFT JOIN profiles p ON p.id = d.moderator_id
             WHERE d.content_id = ?
             ORDER BY d.decided_at ASC, d.rowid ASC",
        )
        .bind(id)
        .fetch_all(&*self.db)
        .await?;
        Ok(decisions)
    }
}

fn not_pending(kind: ContentKind, id: Uuid, current: ContentStatus) -> ServiceError {
    ServiceError::InvalidStateTransition {
        entity: kind.as_str(),
        id: id.to_string(),
        current: current.to_string(),
        expected: ContentStatus::Pending.as_str(),
    }
}
