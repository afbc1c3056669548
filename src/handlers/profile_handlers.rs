//! The caller's own profile and lists under `/me`.

use super::image_handlers::{body_stream, content_type};
use crate::{
    auth::Actor,
    errors::AppError,
    models::{
        content::{ContentKind, ContentView},
        draft::ProfileUpdate,
        profile::{Me, Profile},
    },
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::HeaderMap,
};

pub async fn me(State(state): State<AppState>, actor: Actor) -> Result<Json<Me>, AppError> {
    Ok(Json(state.profiles.me(&actor).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    actor: Actor,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.profiles.update_profile(&actor, update).await?))
}

/// `PUT /me/avatar` with the raw image as body.
pub async fn replace_avatar(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Profile>, AppError> {
    let profile = state
        .profiles
        .replace_avatar(&actor, content_type(&headers), body_stream(body))
        .await?;
    Ok(Json(profile))
}

pub async fn my_content(
    State(state): State<AppState>,
    actor: Actor,
    Path(kind): Path<ContentKind>,
) -> Result<Json<Vec<ContentView>>, AppError> {
    Ok(Json(state.content.list_own(&actor, kind).await?))
}

pub async fn my_saved(
    State(state): State<AppState>,
    actor: Actor,
    Path(kind): Path<ContentKind>,
) -> Result<Json<Vec<ContentView>>, AppError> {
    Ok(Json(state.saved.list_saved(&actor, kind).await?))
}
