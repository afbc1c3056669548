//! Public and author-facing content endpoints under `/content/{kind}`.

use crate::{
    auth::Actor,
    errors::AppError,
    models::{
        content::{ContentItem, ContentKind, ContentView},
        draft::ContentDraft,
        report::{Report, ReportDraft},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SavedStatus {
    pub saved: bool,
}

/// `GET /content/{kind}?q=`
pub async fn browse(
    State(state): State<AppState>,
    Path(kind): Path<ContentKind>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<Vec<ContentView>>, AppError> {
    let items = state.content.browse(kind, query.q.as_deref()).await?;
    Ok(Json(items))
}

/// `POST /content/{kind}`
pub async fn submit(
    State(state): State<AppState>,
    actor: Actor,
    Path(kind): Path<ContentKind>,
    Json(draft): Json<ContentDraft>,
) -> Result<(StatusCode, Json<ContentItem>), AppError> {
    let item = state.content.submit(&actor, kind, draft).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// `GET /content/{kind}/{id}`; anonymous callers only see approved items.
pub async fn get_item(
    State(state): State<AppState>,
    actor: Option<Actor>,
    Path((kind, id)): Path<(ContentKind, Uuid)>,
) -> Result<Json<ContentView>, AppError> {
    let view = state.content.get(actor.as_ref(), kind, id).await?;
    Ok(Json(view))
}

/// `PUT /content/{kind}/{id}` re-queues the item for moderation.
pub async fn resubmit(
    State(state): State<AppState>,
    actor: Actor,
    Path((kind, id)): Path<(ContentKind, Uuid)>,
    Json(draft): Json<ContentDraft>,
) -> Result<Json<ContentItem>, AppError> {
    let item = state.content.resubmit_edit(&actor, kind, id, draft).await?;
    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<AppState>,
    actor: Actor,
    Path((kind, id)): Path<(ContentKind, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.content.delete(&actor, kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn save(
    State(state): State<AppState>,
    actor: Actor,
    Path((kind, id)): Path<(ContentKind, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.saved.save(&actor, kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unsave(
    State(state): State<AppState>,
    actor: Actor,
    Path((kind, id)): Path<(ContentKind, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.saved.unsave(&actor, kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn saved_status(
    State(state): State<AppState>,
    actor: Actor,
    Path((kind, id)): Path<(ContentKind, Uuid)>,
) -> Result<Json<SavedStatus>, AppError> {
    let saved = state.saved.is_saved(&actor, kind, id).await?;
    Ok(Json(SavedStatus { saved }))
}

/// `POST /content/{kind}/{id}/reports`
pub async fn file_report(
    State(state): State<AppState>,
    actor: Actor,
    Path((kind, id)): Path<(ContentKind, Uuid)>,
    Json(draft): Json<ReportDraft>,
) -> Result<(StatusCode, Json<Report>), AppError> {
    let report = state.reports.file_report(&actor, kind, id, draft).await?;
    Ok((StatusCode::CREATED, Json(report)))
}
