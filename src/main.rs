use anyhow::Result;
use axum::Router;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod testing;

use config::Mode;
use models::profile::Role;
use services::{
    access_service::AccessService,
    image_store::{ImageStore, UNATTACHED_GRACE_HOURS},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting pantry-share with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db = Arc::new(db::connect(&cfg.database_url).await?);

    let images = ImageStore::new(db.clone(), cfg.storage_dir.clone(), cfg.public_url.clone());

    // --- Operator modes ---
    match mode {
        Mode::Migrate => {
            db::run_migrations(&db).await?;
            tracing::info!("Database migration complete.");
            return Ok(());
        }
        Mode::GrantAdmin(user_id) => {
            db::run_migrations(&db).await?;
            AccessService::new(db.clone())
                .set_role(user_id, Role::Admin)
                .await?;
            tracing::info!("Granted admin role to {}", user_id);
            return Ok(());
        }
        Mode::PruneImages => {
            db::run_migrations(&db).await?;
            let cutoff = chrono::Utc::now() - chrono::TimeDelta::hours(UNATTACHED_GRACE_HOURS);
            let removed = images.prune_unattached(cutoff).await?;
            tracing::info!("Removed {} unattached images older than {}", removed, cutoff);
            return Ok(());
        }
        Mode::Serve => {
            // statements are idempotent, so a fresh database is usable right away
            db::run_migrations(&db).await?;
        }
    }

    // --- Initialize services ---
    let state = state::AppState::new(db, images, auth::AuthKeys::from_secret(&cfg.jwt_secret));

    // --- Build router ---
    let app: Router = routes::routes::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
