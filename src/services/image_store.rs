//! src/services/image_store.rs
//!
//! ImageStore — the object store behind content images and avatars. Metadata
//! lives in SQLite, payloads on local disk sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}`. Every stored image is reachable
//! through a stable public URL derived from the configured base URL.

use super::{ServiceError, ServiceResult};
use crate::models::image::{ALLOWED_IMAGE_TYPES, ImageBucket, StoredImage};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Uploads younger than this are never swept, so a client has time to
/// attach what it just uploaded.
pub const UNATTACHED_GRACE_HOURS: i64 = 24;

const IMAGE_COLUMNS: &str =
    "id, bucket, key, owner_id, content_type, size_bytes, etag, created_at";

#[derive(Clone)]
pub struct ImageStore {
    /// Shared SQLite connection pool used for image metadata.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where image payloads are stored.
    pub base_path: PathBuf,

    /// Externally visible origin, e.g. `https://pantry.example`.
    public_base_url: String,
}

impl ImageStore {
    pub fn new(
        db: Arc<SqlitePool>,
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Public URL under which `bucket/key` is served.
    pub fn public_url(&self, bucket: ImageBucket, key: &str) -> String {
        format!("{}/images/{}/{}", self.public_base_url, bucket, key)
    }

    /// Inverse of [`public_url`](Self::public_url). Returns `None` for URLs
    /// that do not point into this store.
    pub fn parse_public_url(&self, url: &str) -> Option<(ImageBucket, String)> {
        let prefix = format!("{}/images/", self.public_base_url);
        let rest = url.strip_prefix(&prefix)?;
        let (bucket, key) = rest.split_once('/')?;
        let bucket = ImageBucket::parse(bucket)?;
        ensure_key_safe(key).ok()?;
        Some((bucket, key.to_string()))
    }

    /// Normalise a `Content-Type` header and check it against the allow-list.
    pub fn ensure_content_type(content_type: Option<&str>) -> ServiceResult<String> {
        let normalized = content_type
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .unwrap_or_default();
        if ALLOWED_IMAGE_TYPES.contains(&normalized.as_str()) {
            Ok(normalized)
        } else {
            Err(ServiceError::invalid(
                "file",
                "Please upload a JPEG, PNG, GIF, or WebP image.",
            ))
        }
    }

    /// Generate two-level shard identifiers for an object key.
    ///
    /// Uses MD5(bucket/key) and returns the first two bytes as lowercase
    /// hexadecimal strings (00–ff). Reduces file count per directory.
    fn object_shards(bucket: ImageBucket, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn bucket_root(&self, bucket: ImageBucket) -> PathBuf {
        self.base_path.join(bucket.as_str())
    }

    fn object_path(&self, bucket: ImageBucket, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket, key);
        let mut path = self.bucket_root(bucket);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Fetch image metadata. Returns NotFound if missing.
    pub async fn fetch(&self, bucket: ImageBucket, key: &str) -> ServiceResult<StoredImage> {
        ensure_key_safe(key)?;
        sqlx::query_as::<_, StoredImage>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE bucket = ? AND key = ?"
        ))
        .bind(bucket)
        .bind(key)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| ServiceError::not_found("image", format!("{bucket}/{key}")))
    }

    /// True when `url` names an image in `bucket` uploaded by `owner`.
    pub async fn is_attachable(
        &self,
        url: &str,
        owner: Uuid,
        bucket: ImageBucket,
    ) -> ServiceResult<bool> {
        let Some((url_bucket, key)) = self.parse_public_url(url) else {
            return Ok(false);
        };
        if url_bucket != bucket {
            return Ok(false);
        }
        match self.fetch(bucket, &key).await {
            Ok(image) => Ok(image.owner_id == owner),
            Err(ServiceError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Write, read back and delete a scratch file under the store root.
    pub async fn check_writable(&self) -> ServiceResult<()> {
        let scratch = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        let written = fs::write(&scratch, b"readyz").await;
        let read_back = match written {
            Ok(()) => fs::read(&scratch).await,
            Err(err) => return Err(err.into()),
        };
        let _ = fs::remove_file(&scratch).await;
        match read_back {
            Ok(bytes) if bytes == b"readyz" => Ok(()),
            Ok(_) => Err(io::Error::new(ErrorKind::InvalidData, "scratch file mismatch").into()),
            Err(err) => Err(err.into()),
        }
    }

    /// True while a content item or a profile still points at `url`.
    pub async fn is_referenced(&self, url: &str) -> ServiceResult<bool> {
        let referenced = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM content_items WHERE image_url = ?)
                 OR EXISTS(SELECT 1 FROM profiles WHERE avatar_url = ?)",
        )
        .bind(url)
        .bind(url)
        .fetch_one(&*self.db)
        .await?;
        Ok(referenced)
    }

    /// Stream-upload an image to disk and record its metadata.
    ///
    /// - Rejects content types outside the allow-list before touching disk.
    /// - Writes bytes incrementally to a temporary file, aborting as soon as
    ///   the bucket's size limit is exceeded.
    /// - Computes MD5/etag and size while streaming.
    /// - Atomically renames into final location, then inserts metadata.
    ///
    /// The temp file (or final file, if the metadata insert fails) is removed
    /// on every error path.
    pub async fn upload_stream<S>(
        &self,
        owner: Uuid,
        bucket: ImageBucket,
        filename: Option<&str>,
        content_type: Option<&str>,
        stream: S,
    ) -> ServiceResult<StoredImage>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let content_type = Self::ensure_content_type(content_type)?;
        let key = object_key(owner, filename, &content_type);
        let max_bytes = bucket.max_bytes();

        let file_path = self.object_path(bucket, &key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            io::Error::new(ErrorKind::Other, "image path missing parent directory")
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: u64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(err.into());
                }
            };
            size_bytes += chunk.len() as u64;
            if size_bytes > max_bytes {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(ServiceError::invalid(
                    "file",
                    format!(
                        "Please upload an image smaller than {}MB.",
                        max_bytes / (1024 * 1024)
                    ),
                ));
            }
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err.into());
            }
        }
        if size_bytes == 0 {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ServiceError::invalid("file", "Uploaded image is empty."));
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        let insert_result = sqlx::query_as::<_, StoredImage>(&format!(
            "INSERT INTO images ({IMAGE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(bucket)
        .bind(&key)
        .bind(owner)
        .bind(&content_type)
        .bind(size_bytes as i64)
        .bind(format!("{:x}", digest.compute()))
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        match insert_result {
            Ok(image) => {
                info!(%owner, %bucket, key = %image.key, size_bytes, "stored image");
                Ok(image)
            }
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(err.into())
            }
        }
    }

    /// Metadata and an opened file handle ready for streaming out.
    /// Returns NotFound if metadata exists but the physical file is missing.
    pub async fn open(&self, bucket: ImageBucket, key: &str) -> ServiceResult<(StoredImage, File)> {
        let image = self.fetch(bucket, key).await?;
        let file = File::open(self.object_path(bucket, key))
            .await
            .map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    ServiceError::not_found("image", format!("{bucket}/{key}"))
                } else {
                    err.into()
                }
            })?;
        Ok((image, file))
    }

    /// Delete an image on behalf of `actor`, who must have uploaded it.
    /// An image still attached to an item or a profile cannot be deleted.
    pub async fn remove(
        &self,
        actor: Uuid,
        bucket: ImageBucket,
        key: &str,
    ) -> ServiceResult<StoredImage> {
        let image = self.fetch(bucket, key).await?;
        if image.owner_id != actor {
            return Err(ServiceError::denied("only the uploader may delete an image"));
        }
        if self.is_referenced(&self.public_url(bucket, key)).await? {
            return Err(ServiceError::InvalidStateTransition {
                entity: "image",
                id: format!("{bucket}/{key}"),
                current: "attached".to_string(),
                expected: "unattached",
            });
        }
        self.delete_unchecked(bucket, key).await?;
        Ok(image)
    }

    /// Remove the image behind `url`, swallowing every failure. Used when an
    /// item or profile stops referencing an image; never blocks the caller.
    /// Images something else still points at are left alone.
    pub async fn remove_url_best_effort(&self, url: &str) {
        let Some((bucket, key)) = self.parse_public_url(url) else {
            debug!(url, "not a stored image url, nothing to remove");
            return;
        };
        match self.is_referenced(url).await {
            Ok(false) => {}
            Ok(true) => {
                debug!(url, "image still referenced, keeping it");
                return;
            }
            Err(err) => {
                warn!(url, error = %err, "could not check image references");
                return;
            }
        }
        if let Err(err) = self.delete_unchecked(bucket, &key).await {
            warn!(url, error = %err, "failed to remove replaced image");
        }
    }

    /// Delete uploads created before `cutoff` that nothing references.
    /// Returns how many were removed.
    pub async fn prune_unattached(&self, cutoff: DateTime<Utc>) -> ServiceResult<usize> {
        let candidates = sqlx::query_as::<_, StoredImage>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE created_at < ? ORDER BY created_at ASC"
        ))
        .bind(cutoff)
        .fetch_all(&*self.db)
        .await?;

        let mut removed = 0;
        for image in candidates {
            if self.is_referenced(&self.public_url(image.bucket, &image.key)).await? {
                continue;
            }
            self.delete_unchecked(image.bucket, &image.key).await?;
            removed += 1;
        }
        info!(removed, %cutoff, "pruned unattached images");
        Ok(removed)
    }

    async fn delete_unchecked(&self, bucket: ImageBucket, key: &str) -> ServiceResult<()> {
        sqlx::query("DELETE FROM images WHERE bucket = ? AND key = ?")
            .bind(bucket)
            .bind(key)
            .execute(&*self.db)
            .await?;

        let file_path = self.object_path(bucket, key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(err.into()),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.bucket_root(bucket)).await;
        }
        Ok(())
    }

    /// Recursively remove empty directories up to the bucket root.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

/// Rejects keys that are empty, overlong, absolute, or contain `..` or
/// control characters.
fn ensure_key_safe(key: &str) -> ServiceResult<()> {
    let unsafe_key = key.is_empty()
        || key.len() > MAX_OBJECT_KEY_LEN
        || key.starts_with('/')
        || key.contains("..")
        || key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
    if unsafe_key {
        Err(ServiceError::invalid("key", "invalid image key"))
    } else {
        Ok(())
    }
}

/// `<owner>/<unix millis>-<random>.<ext>`, extension taken from the
/// uploaded filename when it has a sane one, else from the content type.
fn object_key(owner: Uuid, filename: Option<&str>, content_type: &str) -> String {
    let ext = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| {
            match content_type {
                "image/png" => "png",
                "image/gif" => "gif",
                "image/webp" => "webp",
                _ => "jpg",
            }
            .to_string()
        });
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}/{}-{}.{}",
        owner,
        Utc::now().timestamp_millis(),
        &suffix[..8],
        ext
    )
}
