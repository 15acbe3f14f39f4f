//! Axum router — maps all URL paths to handlers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::handlers::{
    api::{compare_endpoint, get_trial, health, list_trials, root},
    dashboard::dashboard,
};
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        // API
        .route("/",                  get(root))
        .route("/trials",            get(list_trials))
        .route("/trials/{nct_id}",   get(get_trial))
        .route("/endpoints/{name}",  get(compare_endpoint))
        .route("/health",            get(health))

        // Pages
        .route("/dashboard",         get(dashboard))

        // Middleware
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "API listening");
    axum::serve(listener, app).await?;
    Ok(())
}
