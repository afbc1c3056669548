//! Moderator endpoints under `/admin`. Every handler relies on the service
//! layer to check the moderator role.

use crate::{
    auth::Actor,
    errors::AppError,
    models::{
        content::{ContentItem, ContentKind, ContentView, ModerationDecision},
        profile::{Role, UserOverview},
        report::{Report, ReportView},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Optional body of approve/reject.
#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RoleChange {
    pub user_id: Uuid,
    pub role: Role,
}

pub async fn queue(
    State(state): State<AppState>,
    actor: Actor,
    Path(kind): Path<ContentKind>,
) -> Result<Json<Vec<ContentView>>, AppError> {
    Ok(Json(state.moderation.pending_queue(&actor, kind).await?))
}

pub async fn approve(
    State(state): State<AppState>,
    actor: Actor,
    Path((kind, id)): Path<(ContentKind, Uuid)>,
    body: Option<Json<DecisionBody>>,
) -> Result<Json<ContentItem>, AppError> {
    let notes = body.and_then(|Json(body)| body.notes);
    let item = state.moderation.approve(&actor, kind, id, notes).await?;
    Ok(Json(item))
}

pub async fn reject(
    State(state): State<AppState>,
    actor: Actor,
    Path((kind, id)): Path<(ContentKind, Uuid)>,
    body: Option<Json<DecisionBody>>,
) -> Result<Json<ContentItem>, AppError> {
    let notes = body.and_then(|Json(body)| body.notes);
    let item = state.moderation.reject(&actor, kind, id, notes).await?;
    Ok(Json(item))
}

pub async fn history(
    State(state): State<AppState>,
    actor: Actor,
    Path((kind, id)): Path<(ContentKind, Uuid)>,
) -> Result<Json<Vec<ModerationDecision>>, AppError> {
    Ok(Json(state.moderation.history(&actor, kind, id).await?))
}

pub async fn pending_reports(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<ReportView>>, AppError> {
    Ok(Json(state.reports.pending_reports(&actor).await?))
}

pub async fn resolve_report(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Report>, AppError> {
    Ok(Json(state.reports.resolve(&actor, id).await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<UserOverview>>, AppError> {
    Ok(Json(state.access.list_users(&actor).await?))
}

pub async fn toggle_role(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> Result<Json<RoleChange>, AppError> {
    let role = state.access.toggle_moderator(&actor, user_id).await?;
    Ok(Json(RoleChange { user_id, role }))
}
