//! Job admission and lifecycle endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Job, JobCreateRequest, JobStats};
use crate::web::AppState;
use crate::web::responses::{handle_error, handle_result};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListJobsQuery {
    /// Resource (project) whose jobs to list
    pub resource_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub stats: JobStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessResponse {
    /// Job settled by this invocation, if any work was eligible
    pub processed_job_id: Option<Uuid>,
}

/// POST /api/v1/jobs
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<JobCreateRequest>,
) -> Response {
    handle_result(
        state.scheduler.enqueue(request).await,
        StatusCode::CREATED,
    )
}

/// GET /api/v1/jobs?resource_id=
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Response {
    let result = async {
        let jobs = state
            .scheduler
            .jobs_for_resource(&query.resource_id)
            .await?;
        let stats = state
            .scheduler
            .stats_for_resource(&query.resource_id)
            .await?;
        Ok::<_, AppError>(JobListResponse { jobs, stats })
    }
    .await;
    handle_result(result, StatusCode::OK)
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let result = state.scheduler.get_job(&id).await.and_then(|job| {
        job.ok_or_else(|| AppError::not_found("job", id.to_string()))
    });
    handle_result(result, StatusCode::OK)
}

/// POST /api/v1/jobs/process
///
/// Pump one job through the processor. Deployments without a resident
/// worker loop call this from an external cron.
pub async fn process_next(State(state): State<AppState>) -> Response {
    match state.processor.tick().await {
        Ok(processed_job_id) => handle_result(
            Ok::<_, AppError>(ProcessResponse { processed_job_id }),
            StatusCode::OK,
        ),
        Err(e) => handle_error(AppError::internal(e.to_string())),
    }
}

/// POST /api/v1/jobs/{id}/cancel
pub async fn cancel_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.processor.cancel(&id).await {
        Ok(true) => handle_result(
            Ok::<_, AppError>(serde_json::json!({ "cancelled": id })),
            StatusCode::OK,
        ),
        Ok(false) => handle_error(AppError::not_found("cancellable job", id.to_string())),
        Err(e) => handle_error(AppError::internal(e.to_string())),
    }
}
