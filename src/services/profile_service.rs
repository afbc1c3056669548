//! The caller's own profile: lazy creation, edits and avatar replacement.

use super::{ServiceResult, access_service::AccessService, image_store::ImageStore};
use crate::{
    auth::Actor,
    models::{
        draft::ProfileUpdate,
        image::ImageBucket,
        profile::{Me, Profile},
    },
};
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use sqlx::SqlitePool;
use std::{io, sync::Arc};
use tracing::info;

const PROFILE_COLUMNS: &str = "id, username, bio, avatar_url, created_at";

#[derive(Clone)]
pub struct ProfileService {
    db: Arc<SqlitePool>,
    images: ImageStore,
    access: AccessService,
}

/// Username for a first-time user: the local part of their email when long
/// enough, otherwise `user-` and the start of their id.
fn default_username(actor: &Actor) -> String {
    actor
        .email
        .as_deref()
        .and_then(|email| email.split('@').next())
        .map(str::trim)
        .filter(|local| local.chars().count() >= 3)
        .map(str::to_string)
        .unwrap_or_else(|| format!("user-{}", &actor.id.simple().to_string()[..8]))
}

impl ProfileService {
    pub fn new(db: Arc<SqlitePool>, images: ImageStore, access: AccessService) -> Self {
        Self { db, images, access }
    }

    /// The caller's profile, created on first access.
    pub async fn ensure_profile(&self, actor: &Actor) -> ServiceResult<Profile> {
        let inserted = sqlx::query(
            "INSERT INTO profiles (id, username, created_at) VALUES (?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(actor.id)
        .bind(default_username(actor))
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;
        if inserted.rows_affected() > 0 {
            info!(user = %actor.id, "profile created");
        }

        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?"
        ))
        .bind(actor.id)
        .fetch_one(&*self.db)
        .await?;
        Ok(profile)
    }

    pub async fn me(&self, actor: &Actor) -> ServiceResult<Me> {
        let profile = self.ensure_profile(actor).await?;
        Ok(Me {
            profile,
            email: actor.email.clone(),
            is_moderator: self.access.is_moderator(actor.id).await?,
        })
    }

    pub async fn update_profile(
        &self,
        actor: &Actor,
        update: ProfileUpdate,
    ) -> ServiceResult<Profile> {
        let (username, bio) = update.validate()?;
        self.ensure_profile(actor).await?;
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "UPDATE profiles SET username = ?, bio = ? WHERE id = ? RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(&username)
        .bind(&bio)
        .bind(actor.id)
        .fetch_one(&*self.db)
        .await?;
        info!(user = %actor.id, "profile updated");
        Ok(profile)
    }

    /// Upload a new avatar and point the profile at it. The previous avatar
    /// is removed best-effort; if the profile update fails the new upload is
    /// discarded instead.
    pub async fn replace_avatar<S>(
        &self,
        actor: &Actor,
        content_type: Option<&str>,
        stream: S,
    ) -> ServiceResult<Profile>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let previous = self.ensure_profile(actor).await?;
        let image = self
            .images
            .upload_stream(actor.id, ImageBucket::Avatars, None, content_type, stream)
            .await?;
        let url = self.images.public_url(image.bucket, &image.key);

        let updated = sqlx::query_as::<_, Profile>(&format!(
            "UPDATE profiles SET avatar_url = ? WHERE id = ? RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(&url)
        .bind(actor.id)
        .fetch_one(&*self.db)
        .await;

        let profile = match updated {
            Ok(profile) => profile,
            Err(err) => {
                self.images.remove_url_best_effort(&url).await;
                return Err(err.into());
            }
        };

        info!(user = %actor.id, key = %image.key, "avatar replaced");
        if let Some(old) = previous.avatar_url.as_deref() {
            self.images.remove_url_best_effort(old).await;
        }
        Ok(profile)
    }
}
