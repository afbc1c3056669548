//! Defines every HTTP route of the service.
//!
//! ## Structure
//! - **Content** (`{kind}` is `recipe` or `packaging_idea`)
//!   - `GET    /content/{kind}?q=` — browse approved items
//!   - `POST   /content/{kind}` — submit for moderation
//!   - `GET    /content/{kind}/{id}` — read one item
//!   - `PUT    /content/{kind}/{id}` — edit and re-queue (author)
//!   - `DELETE /content/{kind}/{id}` — delete (author)
//!   - `GET|PUT|DELETE /content/{kind}/{id}/save` — bookmark state
//!   - `POST   /content/{kind}/{id}/reports` — report an item
//!
//! - **Caller** (`/me`, `/me/profile`, `/me/avatar`, `/me/content/{kind}`,
//!   `/me/saved/{kind}`)
//!
//! - **Images**
//!   - `POST   /images/{bucket}?filename=` — upload raw body
//!   - `GET    /images/{bucket}/{*key}` — download
//!   - `DELETE /images/{bucket}/{*key}` — remove (uploader)
//!
//! - **Moderation** under `/admin`: queue, approve/reject, decision history,
//!   reports and user roles.

use crate::{
    handlers::{
        admin_handlers, content_handlers, health_handlers::{healthz, readyz}, image_handlers,
        profile_handlers,
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build the router. State is attached by the caller with `with_state`.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // content
        .route(
            "/content/{kind}",
            get(content_handlers::browse).post(content_handlers::submit),
        )
        .route(
            "/content/{kind}/{id}",
            get(content_handlers::get_item)
                .put(content_handlers::resubmit)
                .delete(content_handlers::delete_item),
        )
        .route(
            "/content/{kind}/{id}/save",
            get(content_handlers::saved_status)
                .put(content_handlers::save)
                .delete(content_handlers::unsave),
        )
        .route(
            "/content/{kind}/{id}/reports",
            post(content_handlers::file_report),
        )
        // caller
        .route("/me", get(profile_handlers::me))
        .route("/me/profile", put(profile_handlers::update_profile))
        .route("/me/avatar", put(profile_handlers::replace_avatar))
        .route("/me/content/{kind}", get(profile_handlers::my_content))
        .route("/me/saved/{kind}", get(profile_handlers::my_saved))
        // images
        .route("/images/{bucket}", post(image_handlers::upload_image))
        .route(
            "/images/{bucket}/{*key}",
            get(image_handlers::get_image).delete(image_handlers::delete_image),
        )
        // moderation
        .route("/admin/queue/{kind}", get(admin_handlers::queue))
        .route(
            "/admin/content/{kind}/{id}/approve",
            post(admin_handlers::approve),
        )
        .route(
            "/admin/content/{kind}/{id}/reject",
            post(admin_handlers::reject),
        )
        .route(
            "/admin/content/{kind}/{id}/history",
            get(admin_handlers::history),
        )
        .route("/admin/reports", get(admin_handlers::pending_reports))
        .route(
            "/admin/reports/{id}/resolve",
            post(admin_handlers::resolve_report),
        )
        .route("/admin/users", get(admin_handlers::list_users))
        .route(
            "/admin/users/{id}/toggle-role",
            post(admin_handlers::toggle_role),
        )
}
