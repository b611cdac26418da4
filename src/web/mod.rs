//! Web server and HTTP API

pub mod handlers;
pub mod responses;

use anyhow::Result;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::database::Database;
use crate::events::EventBroadcaster;
use crate::job_engine::{JobScheduler, QueueProcessor};
use crate::monitoring::RecurringMonitor;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub scheduler: Arc<JobScheduler>,
    pub processor: Arc<QueueProcessor>,
    pub monitor: Arc<RecurringMonitor>,
    pub broadcaster: Arc<EventBroadcaster>,
}

/// Build the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/v1/jobs",
            post(handlers::jobs::create_job).get(handlers::jobs::list_jobs),
        )
        .route("/api/v1/jobs/process", post(handlers::jobs::process_next))
        .route("/api/v1/jobs/{id}", get(handlers::jobs::get_job))
        .route("/api/v1/jobs/{id}/cancel", post(handlers::jobs::cancel_job))
        .route(
            "/api/v1/monitoring/configs",
            post(handlers::monitoring::create_config),
        )
        .route(
            "/api/v1/monitoring/process",
            post(handlers::monitoring::process_due),
        )
        .route(
            "/api/v1/monitoring/{config_id}/run",
            post(handlers::monitoring::trigger_run),
        )
        .route("/api/v1/events/{topic}", get(handlers::events::stream_events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API until the token fires
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    cancellation_token: CancellationToken,
) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("web server listening on {}:{}", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancellation_token.cancelled().await })
        .await?;
    Ok(())
}
