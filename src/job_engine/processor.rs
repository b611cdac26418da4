//! Queue processor: reap, claim, execute, settle
//!
//! One tick processes at most one job end to end. Claims are optimistic
//! conditional updates against the store, so several processors can share a
//! queue without coordination; losing a claim just means trying the next
//! candidate.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::RwLock as TokioRwLock;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::JobEngineConfig;
use crate::database::repositories::JobSeaOrmRepository;
use crate::events::{EngineEvent, EventBroadcaster};
use crate::job_engine::executor::{AnalysisExecutor, ProgressHandle};
use crate::job_engine::retry::{RetryDecision, RetryPolicy};
use crate::job_engine::types::dequeue_order;
use crate::models::Job;

/// Drives claimed jobs through their executor and settles the outcome
pub struct QueueProcessor {
    repository: JobSeaOrmRepository,
    executor: Arc<dyn AnalysisExecutor>,
    broadcaster: Arc<EventBroadcaster>,
    retry_policy: RetryPolicy,
    lease_duration: ChronoDuration,
    tick_interval: std::time::Duration,
    batch_size: u64,
    /// Cancellation handles for jobs currently executing in this process
    running: Arc<TokioRwLock<HashMap<Uuid, CancellationToken>>>,
}

impl QueueProcessor {
    pub fn new(
        repository: JobSeaOrmRepository,
        executor: Arc<dyn AnalysisExecutor>,
        broadcaster: Arc<EventBroadcaster>,
        config: &JobEngineConfig,
    ) -> Result<Self> {
        let retry_policy = RetryPolicy::new(
            ChronoDuration::from_std(config.retry_base_delay()?)?,
            config.retry_jitter,
        );
        Ok(Self {
            repository,
            executor,
            broadcaster,
            retry_policy,
            lease_duration: ChronoDuration::from_std(config.lease_duration()?)?,
            tick_interval: config.tick_interval()?,
            batch_size: config.dequeue_batch_size,
            running: Arc::new(TokioRwLock::new(HashMap::new())),
        })
    }

    /// Process at most one eligible job; returns its ID when one was settled
    pub async fn tick(&self) -> Result<Option<Uuid>> {
        let now = Utc::now();
        self.reap_expired_leases(now).await?;

        let mut candidates = self.repository.find_claimable(now, self.batch_size).await?;
        candidates.sort_by(dequeue_order);

        for job in candidates {
            let lease_expires_at = now + self.lease_duration;
            let claimed = self
                .repository
                .claim(&job.id, job.status, now, lease_expires_at)
                .await?;
            if !claimed {
                // Lost the race or the job moved on; try the next candidate
                debug!(job_id = %job.id, "claim lost, skipping");
                continue;
            }
            self.publish_status(&job, "started");
            let settled_id = job.id;
            self.execute_claimed(job).await?;
            return Ok(Some(settled_id));
        }
        Ok(None)
    }

    /// Run the processing loop until the token fires
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        info!(
            tick_interval = ?self.tick_interval,
            batch_size = self.batch_size,
            "queue processor started"
        );
        let mut ticker = interval(self.tick_interval);

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("queue processor received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    // Drain everything currently eligible before sleeping again
                    loop {
                        match self.tick().await {
                            Ok(Some(job_id)) => {
                                debug!(job_id = %job_id, "job settled");
                                if cancellation_token.is_cancelled() {
                                    break;
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                error!("queue processor tick failed: {}", e);
                                break;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Cancel a job: pending jobs flip directly, running jobs get their token
    /// fired and settle through the executor outcome path
    pub async fn cancel(&self, job_id: &Uuid) -> Result<bool> {
        let now = Utc::now();
        if self.repository.cancel_pending(job_id, now).await? {
            info!(job_id = %job_id, "pending job cancelled");
            if let Some(job) = self.repository.find_by_id(job_id).await? {
                self.publish_status(&job, "cancelled");
            }
            return Ok(true);
        }

        let running = self.running.read().await;
        if let Some(token) = running.get(job_id) {
            info!(job_id = %job_id, "cancellation requested for running job");
            token.cancel();
            return Ok(true);
        }
        Ok(false)
    }

    /// Reclaim running jobs whose lease expired (crashed or stalled worker)
    async fn reap_expired_leases(&self, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let expired = self.repository.find_expired_leases(now).await?;
        for job in expired {
            // Jobs executing in this process renew their lease on every
            // progress report; an expired lease here means nobody owns it.
            if self.running.read().await.contains_key(&job.id) {
                continue;
            }
            warn!(
                job_id = %job.id,
                retry_count = job.retry_count,
                "reclaiming job with expired lease"
            );
            // Conditional on the lease still being expired: the owner may
            // have renewed between the scan and this settle.
            self.settle_failure(&job, "lease expired", now, Some(now))
                .await?;
        }
        Ok(())
    }

    async fn execute_claimed(&self, job: Job) -> Result<()> {
        let cancel = CancellationToken::new();
        self.running.write().await.insert(job.id, cancel.clone());

        let progress = ProgressHandle::new(
            &job,
            self.repository.clone(),
            self.broadcaster.clone(),
            self.lease_duration,
        );
        // A panicking executor must not take the worker loop down with it;
        // the panic becomes a normal failed attempt.
        let outcome = AssertUnwindSafe(self.executor.execute(&job, &progress, cancel.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(anyhow::anyhow!("executor panicked")));

        self.running.write().await.remove(&job.id);
        let now = Utc::now();
        match outcome {
            Ok(summary) => {
                if self.repository.complete(&job.id, summary, now).await? {
                    info!(job_id = %job.id, "job completed");
                    self.publish_status(&job, "completed");
                }
            }
            Err(_) if cancel.is_cancelled() => {
                if self.repository.cancel_running(&job.id, now).await? {
                    info!(job_id = %job.id, "running job cancelled");
                    self.publish_status(&job, "cancelled");
                }
            }
            Err(e) => {
                self.settle_failure(&job, &e.to_string(), now, None).await?;
            }
        }
        Ok(())
    }

    /// Apply the retry policy to a failed attempt
    async fn settle_failure(
        &self,
        job: &Job,
        error_message: &str,
        now: chrono::DateTime<chrono::Utc>,
        lease_expired_before: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<()> {
        match self.retry_policy.decide(job.retry_count, job.max_retries) {
            RetryDecision::Retry { delay } => {
                let next_attempt_at = now + delay;
                if self
                    .repository
                    .schedule_retry(
                        &job.id,
                        next_attempt_at,
                        error_message,
                        now,
                        lease_expired_before,
                    )
                    .await?
                {
                    warn!(
                        job_id = %job.id,
                        retry_count = job.retry_count + 1,
                        next_attempt_at = %next_attempt_at,
                        "job attempt failed, retry scheduled: {}",
                        error_message
                    );
                    self.publish_status(job, "retrying");
                }
            }
            RetryDecision::GiveUp => {
                if self
                    .repository
                    .fail(&job.id, error_message, now, lease_expired_before)
                    .await?
                {
                    error!(
                        job_id = %job.id,
                        retries = job.retry_count,
                        "job failed permanently: {}",
                        error_message
                    );
                    self.publish_status(job, "failed");
                }
            }
        }
        Ok(())
    }

    fn publish_status(&self, job: &Job, event_type: &str) {
        self.broadcaster.publish_scoped(
            "jobs",
            &job.resource_id.to_string(),
            EngineEvent::new(
                event_type,
                serde_json::json!({ "job_id": job.id, "resource_id": job.resource_id }),
            ),
        );
    }
}
