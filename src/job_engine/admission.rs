//! Job admission: authorization, per-resource caps and the global queue ceiling
//!
//! Checks run from cheapest-to-refuse to most expensive and the first failure
//! wins. Only after every guard passes is the job durably written; from then
//! on its fate is reported through job state, never through errors.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::JobEngineConfig;
use crate::database::repositories::job::{JobSeaOrmRepository, NewJob};
use crate::errors::{AdmissionError, AppError};
use crate::events::{EngineEvent, EventBroadcaster};
use crate::models::{Job, JobCreateRequest};

/// Decides whether a caller may schedule work against a resource
#[async_trait]
pub trait ResourceAuthorizer: Send + Sync {
    async fn is_authorized(&self, resource_id: &Uuid) -> bool;
}

/// Authorizer for single-tenant deployments: everything is allowed
pub struct AllowAllAuthorizer;

#[async_trait]
impl ResourceAuthorizer for AllowAllAuthorizer {
    async fn is_authorized(&self, _resource_id: &Uuid) -> bool {
        true
    }
}

/// Front door of the job engine
pub struct JobScheduler {
    repository: JobSeaOrmRepository,
    authorizer: Arc<dyn ResourceAuthorizer>,
    broadcaster: Arc<EventBroadcaster>,
    config: JobEngineConfig,
}

impl JobScheduler {
    pub fn new(
        repository: JobSeaOrmRepository,
        authorizer: Arc<dyn ResourceAuthorizer>,
        broadcaster: Arc<EventBroadcaster>,
        config: JobEngineConfig,
    ) -> Self {
        Self {
            repository,
            authorizer,
            broadcaster,
            config,
        }
    }

    /// Admit a new job or refuse it with the reason
    pub async fn enqueue(&self, request: JobCreateRequest) -> Result<Job, AppError> {
        if !self.authorizer.is_authorized(&request.resource_id).await {
            return Err(AdmissionError::AccessDenied {
                resource_id: request.resource_id.to_string(),
            }
            .into());
        }

        let active = self
            .repository
            .count_active_for_resource(&request.resource_id)
            .await
            .map_err(internal)?;
        if active >= self.config.max_active_per_resource {
            debug!(
                resource_id = %request.resource_id,
                active,
                limit = self.config.max_active_per_resource,
                "refusing job: resource saturated"
            );
            return Err(AdmissionError::ResourceSaturated {
                resource_id: request.resource_id.to_string(),
                active,
                limit: self.config.max_active_per_resource,
            }
            .into());
        }

        let depth = self.repository.count_pending().await.map_err(internal)?;
        if depth >= self.config.max_queue_depth {
            let retry_after_secs = self
                .config
                .queue_full_retry_after()
                .map_err(internal)?
                .as_secs();
            return Err(AdmissionError::QueueFull {
                depth,
                retry_after_secs,
            }
            .into());
        }

        let job = self
            .repository
            .create(NewJob {
                resource_id: request.resource_id,
                trigger_data: request.trigger_data,
                priority: request.priority,
                max_retries: request
                    .max_retries
                    .unwrap_or(self.config.default_max_retries),
                scheduled_at: request.scheduled_at.unwrap_or_else(Utc::now),
            })
            .await
            .map_err(internal)?;

        info!(
            job_id = %job.id,
            resource_id = %job.resource_id,
            trigger = %job.trigger_type,
            priority = job.priority,
            "job enqueued"
        );
        self.broadcaster.publish_scoped(
            "jobs",
            &job.resource_id.to_string(),
            EngineEvent::new(
                "created",
                serde_json::json!({
                    "job_id": job.id,
                    "resource_id": job.resource_id,
                    "status": job.status,
                }),
            ),
        );

        Ok(job)
    }

    /// Look up a job by ID
    pub async fn get_job(&self, id: &Uuid) -> Result<Option<Job>, AppError> {
        self.repository.find_by_id(id).await.map_err(internal)
    }

    /// All jobs scoped to one resource, newest first
    pub async fn jobs_for_resource(&self, resource_id: &Uuid) -> Result<Vec<Job>, AppError> {
        self.repository
            .find_by_resource(resource_id)
            .await
            .map_err(internal)
    }

    /// Per-status counts for one resource
    pub async fn stats_for_resource(
        &self,
        resource_id: &Uuid,
    ) -> Result<crate::models::JobStats, AppError> {
        self.repository
            .stats_for_resource(resource_id)
            .await
            .map_err(internal)
    }
}

fn internal(error: anyhow::Error) -> AppError {
    AppError::internal(error.to_string())
}
