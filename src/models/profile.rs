//! User profiles and role assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    /// Same as the authenticated user id.
    pub id: Uuid,
    pub username: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Row of the moderator user table: profile, effective role and how much
/// content the user has submitted.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserOverview {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub role: Role,
    pub content_count: i64,
}

/// Response of `GET /me`.
#[derive(Debug, Clone, Serialize)]
pub struct Me {
    #[serde(flatten)]
    pub profile: Profile,
    pub email: Option<String>,
    pub is_moderator: bool,
}
