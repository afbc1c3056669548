//! Represents an uploaded image held by the local object store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// MIME types accepted for any image upload.
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

const CONTENT_IMAGE_MAX_BYTES: u64 = 5 * 1024 * 1024;
const AVATAR_MAX_BYTES: u64 = 2 * 1024 * 1024;

/// Top-level namespace for stored images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum ImageBucket {
    RecipeImages,
    PackagingImages,
    Avatars,
}

impl ImageBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageBucket::RecipeImages => "recipe-images",
            ImageBucket::PackagingImages => "packaging-images",
            ImageBucket::Avatars => "avatars",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "recipe-images" => Some(ImageBucket::RecipeImages),
            "packaging-images" => Some(ImageBucket::PackagingImages),
            "avatars" => Some(ImageBucket::Avatars),
            _ => None,
        }
    }

    /// Upper bound on a single upload into this bucket.
    pub fn max_bytes(self) -> u64 {
        match self {
            ImageBucket::Avatars => AVATAR_MAX_BYTES,
            ImageBucket::RecipeImages | ImageBucket::PackagingImages => CONTENT_IMAGE_MAX_BYTES,
        }
    }
}

impl fmt::Display for ImageBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for one stored image. The payload itself lives on disk.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct StoredImage {
    pub id: Uuid,

    pub bucket: ImageBucket,

    /// Path-like key within the bucket: `<owner id>/<unix millis>-<hex>.<ext>`.
    pub key: String,

    /// User that uploaded the image; only they may delete it.
    pub owner_id: Uuid,

    pub content_type: String,

    pub size_bytes: i64,

    /// MD5 of the payload, hex encoded.
    pub etag: String,

    pub created_at: DateTime<Utc>,
}
