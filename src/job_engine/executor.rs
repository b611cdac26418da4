//! Executor seam between the queue machinery and the actual audit work

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::database::repositories::JobSeaOrmRepository;
use crate::events::{EngineEvent, EventBroadcaster};
use crate::models::Job;

/// Runs the domain work for one claimed job
///
/// Implementations should poll `cancel` at convenient boundaries and return
/// early with an error when it fires; the processor settles the final state.
#[async_trait]
pub trait AnalysisExecutor: Send + Sync {
    async fn execute(
        &self,
        job: &Job,
        progress: &ProgressHandle,
        cancel: CancellationToken,
    ) -> anyhow::Result<serde_json::Value>;
}

/// Handed to executors for progress reporting
///
/// Each report renews the job's lease, so an executor that reports regularly
/// never loses its claim to the lease reaper.
pub struct ProgressHandle {
    job_id: Uuid,
    resource_id: Uuid,
    repository: JobSeaOrmRepository,
    broadcaster: Arc<EventBroadcaster>,
    lease_duration: Duration,
}

impl ProgressHandle {
    pub fn new(
        job: &Job,
        repository: JobSeaOrmRepository,
        broadcaster: Arc<EventBroadcaster>,
        lease_duration: Duration,
    ) -> Self {
        Self {
            job_id: job.id,
            resource_id: job.resource_id,
            repository,
            broadcaster,
            lease_duration,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Report percent complete; stale (lower) reports are dropped by the store
    pub async fn report(&self, progress: i32, message: Option<&str>) -> anyhow::Result<()> {
        let progress = progress.clamp(0, 100);
        let lease_expires_at = Utc::now() + self.lease_duration;
        let applied = self
            .repository
            .update_progress(&self.job_id, progress, message, lease_expires_at)
            .await?;
        if !applied {
            warn!(job_id = %self.job_id, progress, "progress report dropped (job not running or stale)");
            return Ok(());
        }

        self.broadcaster.publish_scoped(
            "jobs",
            &self.resource_id.to_string(),
            EngineEvent::new(
                "progress",
                serde_json::json!({
                    "job_id": self.job_id,
                    "resource_id": self.resource_id,
                    "progress": progress,
                    "message": message,
                }),
            ),
        );
        Ok(())
    }
}

/// Executor that completes immediately; wiring default and test stand-in
pub struct NoopExecutor;

#[async_trait]
impl AnalysisExecutor for NoopExecutor {
    async fn execute(
        &self,
        job: &Job,
        progress: &ProgressHandle,
        _cancel: CancellationToken,
    ) -> anyhow::Result<serde_json::Value> {
        progress.report(50, Some("processing")).await?;
        Ok(serde_json::json!({
            "resource_id": job.resource_id,
            "trigger": job.trigger_type,
        }))
    }
}
