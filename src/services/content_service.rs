//! Submission, owner edits, deletion and read access for content items.

use super::{ServiceError, ServiceResult, access_service::AccessService, image_store::ImageStore};
use crate::{
    auth::Actor,
    models::{
        content::{ContentItem, ContentKind, ContentStatus, ContentView, Transition},
        draft::{ContentDraft, ValidDraft},
    },
};
use chrono::Utc;
use sqlx::{SqlitePool, types::Json};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct ContentService {
    db: Arc<SqlitePool>,
    images: ImageStore,
    access: AccessService,
}

/// Load a single item of `kind`. NotFound when absent or of another kind.
pub(crate) async fn fetch_item(
    db: &SqlitePool,
    kind: ContentKind,
    id: Uuid,
) -> ServiceResult<ContentItem> {
    sqlx::query_as::<_, ContentItem>(concat!(
        "SELECT ",
        item_columns!(),
        " FROM content_items WHERE id = ? AND kind = ?"
    ))
    .bind(id)
    .bind(kind)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ServiceError::not_found(kind.as_str(), id))
}

/// Approved items are public; anything else is visible only to its author
/// and to moderators. Hidden items answer NotFound, like missing ones.
pub(crate) async fn ensure_visible(
    access: &AccessService,
    viewer: Option<&Actor>,
    item: &ContentItem,
) -> ServiceResult<()> {
    if item.status == ContentStatus::Approved {
        return Ok(());
    }
    if let Some(actor) = viewer {
        let relation = access.relation(actor, item.author_id).await?;
        if relation.is_author || relation.is_moderator {
            return Ok(());
        }
    }
    Err(ServiceError::not_found(item.kind().as_str(), item.id))
}

impl ContentService {
    pub fn new(db: Arc<SqlitePool>, images: ImageStore, access: AccessService) -> Self {
        Self { db, images, access }
    }

    /// An attached image must be one the caller uploaded into the bucket of
    /// the item's kind, and not attached anywhere else. Keeping the current
    /// image needs no re-check.
    async fn check_image(
        &self,
        actor: &Actor,
        kind: ContentKind,
        draft: &ValidDraft,
        current: Option<&str>,
    ) -> ServiceResult<()> {
        let Some(url) = draft.image_url.as_deref() else {
            return Ok(());
        };
        if current == Some(url) {
            return Ok(());
        }
        if !self
            .images
            .is_attachable(url, actor.id, kind.image_bucket())
            .await?
        {
            return Err(ServiceError::invalid(
                "image_url",
                "Image must be uploaded before it can be attached",
            ));
        }
        if self.images.is_referenced(url).await? {
            return Err(ServiceError::invalid(
                "image_url",
                "Image is already attached elsewhere",
            ));
        }
        Ok(())
    }

    /// Create a new item owned by `actor`. It always starts out `pending`
    /// with no moderator decision.
    pub async fn submit(
        &self,
        actor: &Actor,
        kind: ContentKind,
        draft: ContentDraft,
    ) -> ServiceResult<ContentItem> {
        let draft = draft.validate(kind)?;
        self.check_image(actor, kind, &draft, None).await?;

        let now = Utc::now();
        let inserted = sqlx::query_as::<_, ContentItem>(concat!(
            "INSERT INTO content_items (kind, ",
            item_columns!(),
            ") VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?) RETURNING ",
            item_columns!()
        ))
        .bind(kind)
        .bind(Uuid::new_v4())
        .bind(actor.id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.image_url)
        .bind(Json(&draft.payload))
        .bind(ContentStatus::Pending)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await;

        let item = match inserted {
            Ok(item) => item,
            Err(err) => {
                // the upload was made for this item alone
                if let Some(url) = draft.image_url.as_deref() {
                    self.images.remove_url_best_effort(url).await;
                }
                return Err(err.into());
            }
        };

        info!(author = %actor.id, id = %item.id, %kind, "content submitted");
        Ok(item)
    }

    pub async fn get(
        &self,
        viewer: Option<&Actor>,
        kind: ContentKind,
        id: Uuid,
    ) -> ServiceResult<ContentView> {
        let view = sqlx::query_as::<_, ContentView>(view_select!("WHERE c.id = ? AND c.kind = ?"))
            .bind(id)
            .bind(kind)
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found(kind.as_str(), id))?;

        ensure_visible(&self.access, viewer, &view.item).await?;
        Ok(view)
    }

    /// Approved items of `kind`, newest first, optionally filtered by a
    /// case-insensitive search over title, description and tags.
    pub async fn browse(
        &self,
        kind: ContentKind,
        query: Option<&str>,
    ) -> ServiceResult<Vec<ContentView>> {
        let items = sqlx::query_as::<_, ContentView>(view_select!(
            "WHERE c.kind = ? AND c.status = ? ORDER BY c.created_at DESC, c.rowid DESC"
        ))
        .bind(kind)
        .bind(ContentStatus::Approved)
        .fetch_all(&*self.db)
        .await?;

        Ok(match query {
            Some(q) => items
                .into_iter()
                .filter(|view| view.item.matches_query(q))
                .collect(),
            None => items,
        })
    }

    /// The caller's own items of `kind` in every status, newest first.
    pub async fn list_own(&self, actor: &Actor, kind: ContentKind) -> ServiceResult<Vec<ContentView>> {
        let items = sqlx::query_as::<_, ContentView>(view_select!(
            "WHERE c.kind = ? AND c.author_id = ? ORDER BY c.created_at DESC, c.rowid DESC"
        ))
        .bind(kind)
        .bind(actor.id)
        .fetch_all(&*self.db)
        .await?;
        Ok(items)
    }

    /// Overwrite the editable fields and send the item back to the
    /// moderation queue. `approved_at` is cleared; `moderator_notes` stays
    /// until the next decision replaces it. A replaced image is removed
    /// best-effort once the update has landed.
    pub async fn resubmit_edit(
        &self,
        actor: &Actor,
        kind: ContentKind,
        id: Uuid,
        draft: ContentDraft,
    ) -> ServiceResult<ContentItem> {
        let current = fetch_item(&self.db, kind, id).await?;
        let relation = self.access.relation(actor, current.author_id).await?;
        if !Transition::ResubmitEdit.permitted_for(relation) {
            return Err(ServiceError::denied("only the author may edit this item"));
        }

        let draft = draft.validate(kind)?;
        self.check_image(actor, kind, &draft, current.image_url.as_deref())
            .await?;

        let updated = sqlx::query_as::<_, ContentItem>(concat!(
            "UPDATE content_items SET title = ?, description = ?, image_url = ?, payload = ?, \
             status = ?, approved_at = NULL, updated_at = ? \
             WHERE id = ? AND kind = ? AND author_id = ? RETURNING ",
            item_columns!()
        ))
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.image_url)
        .bind(Json(&draft.payload))
        .bind(Transition::ResubmitEdit.resulting_status())
        .bind(Utc::now())
        .bind(id)
        .bind(kind)
        .bind(actor.id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| ServiceError::not_found(kind.as_str(), id))?;

        info!(
            author = %actor.id, %id, %kind, previous = %current.status,
            "content edited and re-queued"
        );

        if let Some(old) = current.image_url.as_deref() {
            if updated.image_url.as_deref() != Some(old) {
                self.images.remove_url_best_effort(old).await;
            }
        }
        Ok(updated)
    }

    /// Remove an item in any status. Reports and saved rows referencing it
    /// are left in place.
    pub async fn delete(&self, actor: &Actor, kind: ContentKind, id: Uuid) -> ServiceResult<()> {
        let current = fetch_item(&self.db, kind, id).await?;
        let relation = self.access.relation(actor, current.author_id).await?;
        if !Transition::Delete.permitted_for(relation) {
            return Err(ServiceError::denied("only the author may delete this item"));
        }

        let result =
            sqlx::query("DELETE FROM content_items WHERE id = ? AND kind = ? AND author_id = ?")
                .bind(id)
                .bind(kind)
                .bind(actor.id)
                .execute(&*self.db)
                .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found(kind.as_str(), id));
        }

        info!(author = %actor.id, %id, %kind, "content deleted");
        if let Some(url) = current.image_url.as_deref() {
            self.images.remove_url_best_effort(url).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{content::ContentPayload, image::ImageBucket},
        testing,
    };
    use bytes::Bytes;
    use futures::stream;
    use serde_json::json;

    async fn approve_directly(db: &SqlitePool, id: Uuid) {
        sqlx::query("UPDATE content_items SET status = 'approved', approved_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(db)
            .await
            .unwrap();
    }

    async fn upload(state: &crate::state::AppState, owner: Uuid, bucket: ImageBucket) -> String {
        let image = state
            .images
            .upload_stream(
                owner,
                bucket,
                Some("pic.png"),
                Some("image/png"),
                stream::iter(vec![Ok(Bytes::from_static(b"img"))]),
            )
            .await
            .unwrap();
        state.images.public_url(image.bucket, &image.key)
    }

    #[tokio::test]
    async fn submission_starts_pending() {
        let (state, _dir) = testing::app_state().await;
        let cook = testing::user(&state.db, "cook").await;

        for kind in [ContentKind::Recipe, ContentKind::PackagingIdea] {
            let item = state
                .content
                .submit(&cook, kind, testing::draft_for(kind))
                .await
                .unwrap();
            assert_eq!(item.kind(), kind);
            assert_eq!(item.author_id, cook.id);
            assert_eq!(item.status, ContentStatus::Pending);
            assert!(item.approved_at.is_none());
            assert!(item.moderator_notes.is_none());
        }
    }

    #[tokio::test]
    async fn invalid_submission_writes_nothing() {
        let (state, _dir) = testing::app_state().await;
        let cook = testing::user(&state.db, "cook").await;
        let draft: ContentDraft = serde_json::from_value(json!({
            "kind": "recipe", "title": "x", "ingredients": [], "steps": ["boil"]
        }))
        .unwrap();

        let err = state
            .content
            .submit(&cook, ContentKind::Recipe, draft)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref e) if e.has("title") && e.has("ingredients")));
        assert!(state.content.list_own(&cook, ContentKind::Recipe).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_must_belong_to_author_and_kind() {
        let (state, _dir) = testing::app_state().await;
        let cook = testing::user(&state.db, "cook").await;
        let other = testing::user(&state.db, "other").await;

        let foreign = upload(&state, other.id, ImageBucket::RecipeImages).await;
        let wrong_bucket = upload(&state, cook.id, ImageBucket::PackagingImages).await;
        let own = upload(&state, cook.id, ImageBucket::RecipeImages).await;

        for url in [foreign, wrong_bucket, "https://elsewhere.example/x.png".to_string()] {
            let mut draft = testing::soup();
            draft.image_url = Some(url);
            let err = state
                .content
                .submit(&cook, ContentKind::Recipe, draft)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Validation(ref e) if e.has("image_url")));
        }

        let mut draft = testing::soup();
        draft.image_url = Some(own.clone());
        let item = state
            .content
            .submit(&cook, ContentKind::Recipe, draft)
            .await
            .unwrap();
        assert_eq!(item.image_url.as_deref(), Some(own.as_str()));
    }

    #[tokio::test]
    async fn image_attaches_to_one_item_only() {
        let (state, _dir) = testing::app_state().await;
        let cook = testing::user(&state.db, "cook").await;
        let url = upload(&state, cook.id, ImageBucket::RecipeImages).await;

        let mut draft = testing::soup();
        draft.image_url = Some(url.clone());
        let first = state.content.submit(&cook, ContentKind::Recipe, draft.clone()).await.unwrap();

        let err = state
            .content
            .submit(&cook, ContentKind::Recipe, draft.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref e) if e.has("image_url")));

        let second = state.content.submit(&cook, ContentKind::Recipe, testing::soup()).await.unwrap();
        let err = state
            .content
            .resubmit_edit(&cook, ContentKind::Recipe, second.id, draft.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref e) if e.has("image_url")));

        // keeping the item's own image is fine
        state
            .content
            .resubmit_edit(&cook, ContentKind::Recipe, first.id, draft)
            .await
            .unwrap();
        let (bucket, key) = state.images.parse_public_url(&url).unwrap();
        assert!(state.images.fetch(bucket, &key).await.is_ok());
    }

    #[tokio::test]
    async fn attached_image_cannot_be_deleted_directly() {
        let (state, _dir) = testing::app_state().await;
        let cook = testing::user(&state.db, "cook").await;
        let url = upload(&state, cook.id, ImageBucket::RecipeImages).await;
        let (bucket, key) = state.images.parse_public_url(&url).unwrap();

        let mut draft = testing::soup();
        draft.image_url = Some(url.clone());
        let item = state.content.submit(&cook, ContentKind::Recipe, draft).await.unwrap();

        assert!(matches!(
            state.images.remove(cook.id, bucket, &key).await,
            Err(ServiceError::InvalidStateTransition { .. })
        ));
        assert!(state.images.fetch(bucket, &key).await.is_ok());

        state.content.delete(&cook, ContentKind::Recipe, item.id).await.unwrap();
        assert!(matches!(
            state.images.fetch(bucket, &key).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn visibility_of_unapproved_items() {
        let (state, _dir) = testing::app_state().await;
        let cook = testing::user(&state.db, "cook").await;
        let stranger = testing::user(&state.db, "stranger").await;
        let admin = testing::moderator(&state.db, "admin").await;
        let item = state
            .content
            .submit(&cook, ContentKind::Recipe, testing::soup())
            .await
            .unwrap();

        let view = state.content.get(Some(&cook), ContentKind::Recipe, item.id).await.unwrap();
        assert_eq!(view.author_username.as_deref(), Some("cook"));
        assert!(state.content.get(Some(&admin), ContentKind::Recipe, item.id).await.is_ok());
        for viewer in [None, Some(&stranger)] {
            assert!(matches!(
                state.content.get(viewer, ContentKind::Recipe, item.id).await,
                Err(ServiceError::NotFound { .. })
            ));
        }
        // wrong kind never resolves
        assert!(matches!(
            state.content.get(Some(&cook), ContentKind::PackagingIdea, item.id).await,
            Err(ServiceError::NotFound { .. })
        ));

        approve_directly(&state.db, item.id).await;
        assert!(state.content.get(None, ContentKind::Recipe, item.id).await.is_ok());
    }

    #[tokio::test]
    async fn browse_lists_approved_newest_first_and_searches() {
        let (state, _dir) = testing::app_state().await;
        let cook = testing::user(&state.db, "cook").await;

        let mut ids = Vec::new();
        for (title, tags) in [("Tomato Soup", vec!["warm"]), ("Lemonade", vec!["summer"])] {
            let mut draft = testing::soup();
            draft.title = title.into();
            if let ContentPayload::Recipe(fields) = &mut draft.payload {
                fields.tags = tags.into_iter().map(String::from).collect();
            }
            let item = state.content.submit(&cook, ContentKind::Recipe, draft).await.unwrap();
            approve_directly(&state.db, item.id).await;
            ids.push(item.id);
        }
        // still pending, never browsable
        state.content.submit(&cook, ContentKind::Recipe, testing::soup()).await.unwrap();

        let all = state.content.browse(ContentKind::Recipe, None).await.unwrap();
        let listed: Vec<Uuid> = all.iter().map(|v| v.item.id).collect();
        assert_eq!(listed, vec![ids[1], ids[0]]);

        let hits = state.content.browse(ContentKind::Recipe, Some("SUMMER")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item.title, "Lemonade");

        assert!(state.content.browse(ContentKind::PackagingIdea, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resubmit_resets_to_pending_and_keeps_notes() {
        let (state, _dir) = testing::app_state().await;
        let cook = testing::user(&state.db, "cook").await;
        let item = state
            .content
            .submit(&cook, ContentKind::Recipe, testing::soup())
            .await
            .unwrap();
        sqlx::query(
            "UPDATE content_items SET status = 'approved', approved_at = ?, moderator_notes = 'nice' WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(item.id)
        .execute(&*state.db)
        .await
        .unwrap();

        let mut draft = testing::soup();
        draft.title = "Better Soup".into();
        let edited = state
            .content
            .resubmit_edit(&cook, ContentKind::Recipe, item.id, draft)
            .await
            .unwrap();
        assert_eq!(edited.title, "Better Soup");
        assert_eq!(edited.status, ContentStatus::Pending);
        assert!(edited.approved_at.is_none());
        assert_eq!(edited.moderator_notes.as_deref(), Some("nice"));
        assert_eq!(edited.created_at, item.created_at);
    }

    #[tokio::test]
    async fn only_author_edits_or_deletes() {
        let (state, _dir) = testing::app_state().await;
        let cook = testing::user(&state.db, "cook").await;
        let admin = testing::moderator(&state.db, "admin").await;
        let stranger = testing::user(&state.db, "stranger").await;
        let item = state
            .content
            .submit(&cook, ContentKind::Recipe, testing::soup())
            .await
            .unwrap();

        for actor in [&admin, &stranger] {
            assert!(matches!(
                state.content.resubmit_edit(actor, ContentKind::Recipe, item.id, testing::soup()).await,
                Err(ServiceError::Authorization(_))
            ));
            assert!(matches!(
                state.content.delete(actor, ContentKind::Recipe, item.id).await,
                Err(ServiceError::Authorization(_))
            ));
        }

        state.content.delete(&cook, ContentKind::Recipe, item.id).await.unwrap();
        assert!(matches!(
            state.content.delete(&cook, ContentKind::Recipe, item.id).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn replacing_image_removes_the_old_one() {
        let (state, _dir) = testing::app_state().await;
        let cook = testing::user(&state.db, "cook").await;
        let first = upload(&state, cook.id, ImageBucket::RecipeImages).await;
        let second = upload(&state, cook.id, ImageBucket::RecipeImages).await;

        let mut draft = testing::soup();
        draft.image_url = Some(first.clone());
        let item = state.content.submit(&cook, ContentKind::Recipe, draft).await.unwrap();

        let mut draft = testing::soup();
        draft.image_url = Some(second.clone());
        state
            .content
            .resubmit_edit(&cook, ContentKind::Recipe, item.id, draft)
            .await
            .unwrap();

        let (bucket, key) = state.images.parse_public_url(&first).unwrap();
        assert!(matches!(
            state.images.fetch(bucket, &key).await,
            Err(ServiceError::NotFound { .. })
        ));

        state.content.delete(&cook, ContentKind::Recipe, item.id).await.unwrap();
        let (bucket, key) = state.images.parse_public_url(&second).unwrap();
        assert!(state.images.fetch(bucket, &key).await.is_err());
    }
}
