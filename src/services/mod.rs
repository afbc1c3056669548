//! Domain services. Every operation takes the caller's identity explicitly and
//! enforces ownership, role and status guards inside its SQL writes.

/// Columns of `content_items` in `ContentItem` field order.
macro_rules! item_columns {
    () => {
        "id, author_id, title, description, image_url, payload, status, \
         moderator_notes, approved_at, created_at, updated_at"
    };
}

/// `SELECT` producing `ContentView` rows: items joined with their author's
/// profile. Append the filter/order clause.
macro_rules! view_select {
    ($tail:literal) => {
        concat!(
            "SELECT c.id, c.author_id, c.title, c.description, c.image_url, c.payload, \
             c.status, c.moderator_notes, c.approved_at, c.created_at, c.updated_at, \
             p.username AS author_username, p.avatar_url AS author_avatar_url \
             FROM content_items c LEFT JOIN profiles p ON p.id = c.author_id ",
            $tail
        )
    };
}

pub mod access_service;
pub mod content_service;
pub mod image_store;
pub mod moderation_service;
pub mod profile_service;
pub mod report_service;
pub mod saved_service;

use crate::models::draft::ValidationErrors;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("not allowed: {0}")]
    Authorization(String),
    #[error("{entity} `{id}` is {current}, expected {expected}")]
    InvalidStateTransition {
        entity: &'static str,
        id: String,
        current: String,
        expected: &'static str,
    },
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Persistence(#[from] sqlx::Error),
    #[error(transparent)]
    ObjectStore(#[from] io::Error),
}

impl ServiceError {
    pub fn denied(reason: impl Into<String>) -> Self {
        ServiceError::Authorization(reason.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Validation(ValidationErrors::single(field, message))
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        ServiceError::Validation(errors)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
