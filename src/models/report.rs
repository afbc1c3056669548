//! User-filed flags against content items.

use super::content::ContentKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReportReason {
    Spam,
    Offensive,
    Dangerous,
    Copyright,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Resolved,
}

/// A report row. Reports are never deleted, only resolved.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Report {
    pub id: Uuid,
    pub content_kind: ContentKind,

    /// Weak reference: the content may have been deleted since.
    pub content_id: Uuid,

    pub reporter_id: Uuid,
    pub reason: ReportReason,
    pub details: Option<String>,
    pub status: ReportStatus,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A pending report joined with the reported content's title/author and the
/// reporter's username, as shown in the moderator report queue.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReportView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub report: Report,
    pub content_title: Option<String>,
    pub content_author_id: Option<Uuid>,
    pub reporter_username: Option<String>,
}

/// `POST /content/{kind}/{id}/reports` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportDraft {
    pub reason: ReportReason,
    #[serde(default)]
    pub details: Option<String>,
}
