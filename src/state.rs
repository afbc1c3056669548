use crate::{
    auth::AuthKeys,
    services::{
        access_service::AccessService, content_service::ContentService, image_store::ImageStore,
        moderation_service::ModerationService, profile_service::ProfileService,
        report_service::ReportService, saved_service::SavedService,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared handler state: one pool, one image root, and the services built
/// over them.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub auth: AuthKeys,
    pub images: ImageStore,
    pub access: AccessService,
    pub content: ContentService,
    pub moderation: ModerationService,
    pub reports: ReportService,
    pub saved: SavedService,
    pub profiles: ProfileService,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, images: ImageStore, auth: AuthKeys) -> Self {
        let access = AccessService::new(db.clone());
        Self {
            content: ContentService::new(db.clone(), images.clone(), access.clone()),
            moderation: ModerationService::new(db.clone(), access.clone()),
            reports: ReportService::new(db.clone(), access.clone()),
            saved: SavedService::new(db.clone(), access.clone()),
            profiles: ProfileService::new(db.clone(), images.clone(), access.clone()),
            access,
            images,
            auth,
            db,
        }
    }
}
