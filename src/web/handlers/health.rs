//! Service health endpoint

use axum::{extract::State, http::StatusCode, response::Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::web::AppState;
use crate::web::responses::handle_result;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Response {
    let database = match state.database.ping().await {
        Ok(()) => "ok",
        Err(_) => "unreachable",
    };
    let status = if database == "ok" { "healthy" } else { "degraded" };
    handle_result(
        Ok::<_, AppError>(HealthResponse { status, database }),
        StatusCode::OK,
    )
}
