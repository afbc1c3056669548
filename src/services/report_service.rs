//! Filing reports against content and working through them.
//!
//! Reports and content moderation are separate state machines: resolving a
//! report leaves the content untouched and deciding on content leaves its
//! reports untouched.

use super::{
    ServiceError, ServiceResult,
    access_service::AccessService,
    content_service::{ensure_visible, fetch_item},
};
use crate::{
    auth::Actor,
    models::{
        content::ContentKind,
        report::{Report, ReportDraft, ReportStatus, ReportView},
    },
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const REPORT_COLUMNS: &str = "id, content_kind, content_id, reporter_id, reason, details, status, \
                              resolved_by, resolved_at, created_at";

#[derive(Clone)]
pub struct ReportService {
    db: Arc<SqlitePool>,
    access: AccessService,
}

impl ReportService {
    pub fn new(db: Arc<SqlitePool>, access: AccessService) -> Self {
        Self { db, access }
    }

    /// Flag an item for moderator attention. Authors cannot report their
    /// own items; items the reporter cannot see do not exist for them.
    pub async fn file_report(
        &self,
        actor: &Actor,
        kind: ContentKind,
        content_id: Uuid,
        draft: ReportDraft,
    ) -> ServiceResult<Report> {
        let item = fetch_item(&self.db, kind, content_id).await?;
        ensure_visible(&self.access, Some(actor), &item).await?;
        if item.author_id == actor.id {
            return Err(ServiceError::denied("you cannot report your own content"));
        }

        let details = draft
            .details
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let report = sqlx::query_as::<_, Report>(&format!(
            "INSERT INTO reports ({REPORT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?)
             RETURNING {REPORT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(kind)
        .bind(content_id)
        .bind(actor.id)
        .bind(draft.reason)
        .bind(details)
        .bind(ReportStatus::Pending)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        info!(reporter = %actor.id, %content_id, %kind, reason = ?report.reason, "report filed");
        Ok(report)
    }

    /// Unresolved reports, oldest first. Content that has since been deleted
    /// shows up with no title.
    pub async fn pending_reports(&self, actor: &Actor) -> ServiceResult<Vec<ReportView>> {
        self.access.require_moderator(actor).await?;
        let reports = sqlx::query_as::<_, ReportView>(
            "SELECT r.id, r.content_kind, r.content_id, r.reporter_id, r.reason, r.details,
                    r.status, r.resolved_by, r.resolved_at, r.created_at,
                    c.title AS content_title, c.author_id AS content_author_id,
                    p.username AS reporter_username
             FROM reports r
             LEFT JOIN content_items c ON c.id = r.content_id
             LEFT JOIN profiles p ON p.id = r.reporter_id
             WHERE r.status = ?
             ORDER BY r.created_at ASC, r.rowid ASC",
        )
        .bind(ReportStatus::Pending)
        .fetch_all(&*self.db)
        .await?;
        Ok(reports)
    }

    pub async fn resolve(&self, actor: &Actor, report_id: Uuid) -> ServiceResult<Report> {
        self.access.require_moderator(actor).await?;

        let resolved = sqlx::query_as::<_, Report>(&format!(
            "UPDATE reports SET status = ?, resolved_by = ?, resolved_at = ?
             WHERE id = ? AND status = ? RETURNING {REPORT_COLUMNS}"
        ))
        .bind(ReportStatus::Resolved)
        .bind(actor.id)
        .bind(Utc::now())
        .bind(report_id)
        .bind(ReportStatus::Pending)
        .fetch_optional(&*self.db)
        .await?;

        match resolved {
            Some(report) => {
                info!(moderator = %actor.id, %report_id, "report resolved");
                Ok(report)
            }
            None => {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM reports WHERE id = ?)",
                )
                .bind(report_id)
                .fetch_one(&*self.db)
                .await?;
                if exists {
                    Err(ServiceError::InvalidStateTransition {
                        entity: "report",
                        id: report_id.to_string(),
                        current: "resolved".into(),
                        expected: "pending",
                    })
                } else {
                    Err(ServiceError::not_found("report", report_id))
                }
            }
        }
    }
}
