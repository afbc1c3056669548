//! Liveness and readiness.
//!
//! `/readyz` answers 503 until the schema is queryable and the image store
//! accepts writes. It also reports how many items wait for moderation.

use crate::{models::content::ContentStatus, state::AppState};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// `GET /healthz`: no I/O, always 200.
pub async fn healthz() -> impl IntoResponse {
    Json(Health { status: "ok" })
}

/// `GET /readyz`
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let backlog = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM content_items WHERE status = ?",
    )
    .bind(ContentStatus::Pending)
    .fetch_one(&*state.db)
    .await;

    let mut checks = BTreeMap::new();
    let pending_moderation = match backlog {
        Ok(count) => {
            checks.insert("schema", Check::passed());
            Some(count)
        }
        Err(err) => {
            checks.insert("schema", Check::failed(err));
            None
        }
    };
    checks.insert(
        "image_store",
        match state.images.check_writable().await {
            Ok(()) => Check::passed(),
            Err(err) => Check::failed(err),
        },
    );

    let ready = checks.values().all(|check| check.ok);
    if !ready {
        warn!(?checks, "not ready");
    }
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(Readiness {
            status: if ready { "ok" } else { "error" },
            checks,
            pending_moderation,
        }),
    )
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
struct Readiness {
    status: &'static str,
    checks: BTreeMap<&'static str, Check>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending_moderation: Option<i64>,
}

#[derive(Debug, Serialize)]
struct Check {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Check {
    fn passed() -> Self {
        Self { ok: true, error: None }
    }

    fn failed(err: impl std::fmt::Display) -> Self {
        Self {
            ok: false,
            error: Some(err.to_string()),
        }
    }
}
