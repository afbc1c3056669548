//! Content items: recipes and packaging ideas sharing one moderation lifecycle.
//!
//! The envelope (ownership, status, timestamps, title/description/image) is
//! common to both variants; the variant-specific fields live in
//! [`ContentPayload`], persisted as tagged JSON next to a `kind` column.

use super::image::ImageBucket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Which variant a content item is. Also used as the `{kind}` path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ContentKind {
    Recipe,
    PackagingIdea,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Recipe => "recipe",
            ContentKind::PackagingIdea => "packaging_idea",
        }
    }

    /// Bucket that images attached to this kind must be uploaded into.
    pub fn image_bucket(self) -> ImageBucket {
        match self {
            ContentKind::Recipe => ImageBucket::RecipeImages,
            ContentKind::PackagingIdea => ImageBucket::PackagingImages,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation status of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ContentStatus {
    Pending,
    Approved,
    Rejected,
}

impl ContentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentStatus::Pending => "pending",
            ContentStatus::Approved => "approved",
            ContentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeFields {
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    #[serde(default)]
    pub prep_time: Option<i64>,
    #[serde(default)]
    pub cook_time: Option<i64>,
    #[serde(default)]
    pub servings: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagingIdeaFields {
    pub materials: Vec<String>,
    pub steps: Vec<String>,
}

/// Variant payload, dispatched on the explicit `kind` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPayload {
    Recipe(RecipeFields),
    PackagingIdea(PackagingIdeaFields),
}

impl ContentPayload {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentPayload::Recipe(_) => ContentKind::Recipe,
            ContentPayload::PackagingIdea(_) => ContentKind::PackagingIdea,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            ContentPayload::Recipe(fields) => &fields.tags,
            ContentPayload::PackagingIdea(_) => &[],
        }
    }
}

/// A stored recipe or packaging idea.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContentItem {
    pub id: Uuid,

    /// Owner of the item; never changes after creation.
    pub author_id: Uuid,

    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,

    #[sqlx(json)]
    #[serde(flatten)]
    pub payload: ContentPayload,

    pub status: ContentStatus,

    /// Notes from the most recent moderation decision, if any.
    pub moderator_notes: Option<String>,

    /// Set exactly when `status` is `approved`.
    pub approved_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn kind(&self) -> ContentKind {
        self.payload.kind()
    }

    /// Case-insensitive substring match over title, description and tags.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
            || self
                .payload
                .tags()
                .iter()
                .any(|tag| tag.to_lowercase().contains(&needle))
    }
}

/// A content item joined with its author's public profile fields.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContentView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: ContentItem,
    pub author_username: Option<String>,
    pub author_avatar_url: Option<String>,
}

/// The lifecycle operations a caller can attempt on an existing item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Approve,
    Reject,
    ResubmitEdit,
    Delete,
}

/// How the caller relates to the item being transitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerRelation {
    pub is_author: bool,
    pub is_moderator: bool,
}

impl Transition {
    /// Moderation decisions need the moderator capability; edits and
    /// deletion belong to the author alone.
    pub fn permitted_for(self, caller: CallerRelation) -> bool {
        match self {
            Transition::Approve | Transition::Reject => caller.is_moderator,
            Transition::ResubmitEdit | Transition::Delete => caller.is_author,
        }
    }

    /// Whether the transition may start from `from`.
    pub fn accepts_origin(self, from: ContentStatus) -> bool {
        match self {
            Transition::Approve | Transition::Reject => from == ContentStatus::Pending,
            Transition::ResubmitEdit | Transition::Delete => true,
        }
    }

    /// Status after the transition; `None` when the item is removed.
    pub fn resulting_status(self) -> Option<ContentStatus> {
        match self {
            Transition::Approve => Some(ContentStatus::Approved),
            Transition::Reject => Some(ContentStatus::Rejected),
            Transition::ResubmitEdit => Some(ContentStatus::Pending),
            Transition::Delete => None,
        }
    }
}

/// A terminal moderation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn transition(self) -> Transition {
        match self {
            Decision::Approved => Transition::Approve,
            Decision::Rejected => Transition::Reject,
        }
    }

    pub fn status(self) -> ContentStatus {
        match self {
            Decision::Approved => ContentStatus::Approved,
            Decision::Rejected => ContentStatus::Rejected,
        }
    }

    /// `approved_at` value written alongside the decision.
    pub fn approved_at(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Decision::Approved => Some(now),
            Decision::Rejected => None,
        }
    }
}

/// One entry of the append-only moderation log.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ModerationDecision {
    pub id: Uuid,
    pub content_id: Uuid,
    pub moderator_id: Uuid,
    pub moderator_username: Option<String>,
    pub decision: Decision,
    pub notes: String,
    pub decided_at: DateTime<Utc>,
}
