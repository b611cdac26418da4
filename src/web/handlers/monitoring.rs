//! Monitoring config and run endpoints

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{MonitoringConfigCreateRequest, TriggerType};
use crate::web::AppState;
use crate::web::responses::{handle_error, handle_result};

#[derive(Debug, Deserialize, ToSchema)]
pub struct TriggerRunRequest {
    pub trigger_type: Option<TriggerType>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TriggerRunResponse {
    pub run_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessDueResponse {
    pub processed_run_ids: Vec<Uuid>,
}

/// POST /api/v1/monitoring/configs
pub async fn create_config(
    State(state): State<AppState>,
    Json(request): Json<MonitoringConfigCreateRequest>,
) -> Response {
    if request.targets.is_empty() {
        return handle_error(AppError::validation(
            "monitoring config needs at least one target",
        ));
    }
    let result = state
        .monitor
        .create_config(request)
        .await;
    handle_result(result, StatusCode::CREATED)
}

/// POST /api/v1/monitoring/{config_id}/run
///
/// The body is optional; an absent or empty trigger type means a manual run.
pub async fn trigger_run(
    State(state): State<AppState>,
    Path(config_id): Path<Uuid>,
    body: Option<Json<TriggerRunRequest>>,
) -> Response {
    let trigger_type = body
        .and_then(|Json(request)| request.trigger_type)
        .unwrap_or(TriggerType::Manual);
    let result = state
        .monitor
        .trigger_run(&config_id, trigger_type, Utc::now())
        .await
        .map(|run| TriggerRunResponse { run_id: run.id });
    handle_result(result, StatusCode::OK)
}

/// POST /api/v1/monitoring/process
///
/// Execute every due config now; cron-invoked in workerless deployments.
pub async fn process_due(State(state): State<AppState>) -> Response {
    match state.monitor.tick(Utc::now()).await {
        Ok(processed_run_ids) => handle_result(
            Ok::<_, AppError>(ProcessDueResponse { processed_run_ids }),
            StatusCode::OK,
        ),
        Err(e) => handle_error(AppError::internal(e.to_string())),
    }
}
