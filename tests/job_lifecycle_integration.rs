//! End-to-end job lifecycle tests against an in-memory SQLite store
//!
//! Each test gets a fresh migrated database, so the optimistic state
//! transitions are exercised against real SQL rather than mocks.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use audit_engine::{
    config::{DatabaseConfig, JobEngineConfig},
    database::{Database, repositories::JobSeaOrmRepository},
    events::EventBroadcaster,
    job_engine::{
        AllowAllAuthorizer, AnalysisExecutor, JobScheduler, NoopExecutor, ProgressHandle,
        QueueProcessor,
    },
    models::{JobCreateRequest, JobStatus, TriggerPayload},
};

async fn test_database() -> Result<Database> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(5),
    };
    let db = Database::new(&config).await?;
    db.migrate().await?;
    Ok(db)
}

fn fast_job_config() -> JobEngineConfig {
    JobEngineConfig {
        retry_base_delay: "0s".to_string(),
        tick_interval: "10ms".to_string(),
        ..Default::default()
    }
}

fn manual_request(resource_id: uuid::Uuid) -> JobCreateRequest {
    JobCreateRequest {
        resource_id,
        trigger_data: TriggerPayload::Manual {
            requested_by: "tests".to_string(),
        },
        priority: 0,
        scheduled_at: None,
        max_retries: None,
    }
}

struct Harness {
    repository: JobSeaOrmRepository,
    scheduler: JobScheduler,
    processor: QueueProcessor,
}

fn harness(db: &Database, executor: Arc<dyn AnalysisExecutor>) -> Result<Harness> {
    let config = fast_job_config();
    let broadcaster = Arc::new(EventBroadcaster::new(16));
    let repository = JobSeaOrmRepository::new(db.connection());
    let scheduler = JobScheduler::new(
        repository.clone(),
        Arc::new(AllowAllAuthorizer),
        broadcaster.clone(),
        config.clone(),
    );
    let processor = QueueProcessor::new(repository.clone(), executor, broadcaster, &config)?;
    Ok(Harness {
        repository,
        scheduler,
        processor,
    })
}

struct FailingExecutor;

#[async_trait]
impl AnalysisExecutor for FailingExecutor {
    async fn execute(
        &self,
        _job: &audit_engine::models::Job,
        _progress: &ProgressHandle,
        _cancel: CancellationToken,
    ) -> Result<serde_json::Value> {
        anyhow::bail!("analysis backend unavailable")
    }
}

struct CancelAwareExecutor;

#[async_trait]
impl AnalysisExecutor for CancelAwareExecutor {
    async fn execute(
        &self,
        _job: &audit_engine::models::Job,
        _progress: &ProgressHandle,
        cancel: CancellationToken,
    ) -> Result<serde_json::Value> {
        cancel.cancel();
        anyhow::bail!("stopped by cancellation")
    }
}

#[tokio::test]
async fn enqueued_job_runs_to_completion() -> Result<()> {
    let db = test_database().await?;
    let h = harness(&db, Arc::new(NoopExecutor))?;

    let job = h.scheduler.enqueue(manual_request(uuid::Uuid::new_v4())).await?;
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.progress, 0);

    let processed = h.processor.tick().await?;
    assert_eq!(processed, Some(job.id));

    let settled = h.repository.find_by_id(&job.id).await?.unwrap();
    assert_eq!(settled.status, JobStatus::Completed);
    assert_eq!(settled.progress, 100);
    assert!(settled.result_summary.is_some());
    assert!(settled.started_at.is_some());
    assert!(settled.completed_at.is_some());
    assert!(settled.lease_expires_at.is_none());

    // Nothing left to do
    assert_eq!(h.processor.tick().await?, None);
    Ok(())
}

#[tokio::test]
async fn deferred_job_is_not_claimed_early() -> Result<()> {
    let db = test_database().await?;
    let h = harness(&db, Arc::new(NoopExecutor))?;

    let mut request = manual_request(uuid::Uuid::new_v4());
    request.scheduled_at = Some(Utc::now() + Duration::hours(1));
    let job = h.scheduler.enqueue(request).await?;

    assert_eq!(h.processor.tick().await?, None);
    let unchanged = h.repository.find_by_id(&job.id).await?.unwrap();
    assert_eq!(unchanged.status, JobStatus::Queued);
    Ok(())
}

#[tokio::test]
async fn concurrent_claims_have_one_winner() -> Result<()> {
    let db = test_database().await?;
    let h = harness(&db, Arc::new(NoopExecutor))?;

    let job = h.scheduler.enqueue(manual_request(uuid::Uuid::new_v4())).await?;
    let now = Utc::now();
    let lease = now + Duration::minutes(10);

    let first = h.repository.claim(&job.id, JobStatus::Queued, now, lease).await?;
    let second = h.repository.claim(&job.id, JobStatus::Queued, now, lease).await?;
    assert!(first);
    assert!(!second);

    let claimed = h.repository.find_by_id(&job.id).await?.unwrap();
    assert_eq!(claimed.status, JobStatus::Running);
    Ok(())
}

#[tokio::test]
async fn progress_is_monotone_within_an_attempt() -> Result<()> {
    let db = test_database().await?;
    let h = harness(&db, Arc::new(NoopExecutor))?;

    let job = h.scheduler.enqueue(manual_request(uuid::Uuid::new_v4())).await?;
    let now = Utc::now();
    let lease = now + Duration::minutes(10);
    assert!(h.repository.claim(&job.id, JobStatus::Queued, now, lease).await?);

    assert!(h.repository.update_progress(&job.id, 50, Some("halfway"), lease).await?);
    // A stale report must not rewind
    assert!(!h.repository.update_progress(&job.id, 25, None, lease).await?);

    let current = h.repository.find_by_id(&job.id).await?.unwrap();
    assert_eq!(current.progress, 50);
    assert_eq!(current.status_message.as_deref(), Some("halfway"));
    Ok(())
}

#[tokio::test]
async fn failed_attempts_back_off_then_fail_permanently() -> Result<()> {
    let db = test_database().await?;
    let h = harness(&db, Arc::new(FailingExecutor))?;

    let mut request = manual_request(uuid::Uuid::new_v4());
    request.max_retries = Some(2);
    let job = h.scheduler.enqueue(request).await?;

    // Base delay is zero in the test config, so retries are due immediately
    h.processor.tick().await?;
    let after_first = h.repository.find_by_id(&job.id).await?.unwrap();
    assert_eq!(after_first.status, JobStatus::Retrying);
    assert_eq!(after_first.retry_count, 1);
    assert_eq!(after_first.progress, 0);
    assert!(after_first.error_message.is_some());

    h.processor.tick().await?;
    let after_second = h.repository.find_by_id(&job.id).await?.unwrap();
    assert_eq!(after_second.status, JobStatus::Retrying);
    assert_eq!(after_second.retry_count, 2);

    h.processor.tick().await?;
    let exhausted = h.repository.find_by_id(&job.id).await?.unwrap();
    assert_eq!(exhausted.status, JobStatus::Failed);
    assert_eq!(exhausted.retry_count, 2);
    assert!(exhausted.completed_at.is_some());

    assert_eq!(h.processor.tick().await?, None);
    Ok(())
}

#[tokio::test]
async fn retry_delay_defers_the_next_attempt() -> Result<()> {
    let db = test_database().await?;
    let config = JobEngineConfig {
        retry_base_delay: "5m".to_string(),
        ..Default::default()
    };
    let broadcaster = Arc::new(EventBroadcaster::new(16));
    let repository = JobSeaOrmRepository::new(db.connection());
    let scheduler = JobScheduler::new(
        repository.clone(),
        Arc::new(AllowAllAuthorizer),
        broadcaster.clone(),
        config.clone(),
    );
    let processor =
        QueueProcessor::new(repository.clone(), Arc::new(FailingExecutor), broadcaster, &config)?;

    let before = Utc::now();
    let job = scheduler.enqueue(manual_request(uuid::Uuid::new_v4())).await?;
    processor.tick().await?;

    let retrying = repository.find_by_id(&job.id).await?.unwrap();
    assert_eq!(retrying.status, JobStatus::Retrying);
    assert!(retrying.scheduled_at >= before + Duration::minutes(5));

    // Not due yet, so the processor leaves it alone
    assert_eq!(processor.tick().await?, None);
    Ok(())
}

#[tokio::test]
async fn pending_job_can_be_cancelled() -> Result<()> {
    let db = test_database().await?;
    let h = harness(&db, Arc::new(NoopExecutor))?;

    let mut request = manual_request(uuid::Uuid::new_v4());
    request.scheduled_at = Some(Utc::now() + Duration::hours(1));
    let job = h.scheduler.enqueue(request).await?;

    assert!(h.processor.cancel(&job.id).await?);
    let cancelled = h.repository.find_by_id(&job.id).await?.unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);

    // Terminal states stay terminal
    assert!(!h.processor.cancel(&job.id).await?);
    assert_eq!(h.processor.tick().await?, None);
    Ok(())
}

#[tokio::test]
async fn cancelled_executor_settles_as_cancelled_not_retrying() -> Result<()> {
    let db = test_database().await?;
    let h = harness(&db, Arc::new(CancelAwareExecutor))?;

    let job = h.scheduler.enqueue(manual_request(uuid::Uuid::new_v4())).await?;
    h.processor.tick().await?;

    let settled = h.repository.find_by_id(&job.id).await?.unwrap();
    assert_eq!(settled.status, JobStatus::Cancelled);
    assert_eq!(settled.retry_count, 0);
    Ok(())
}

#[tokio::test]
async fn expired_lease_is_reclaimed_through_the_retry_policy() -> Result<()> {
    let db = test_database().await?;
    let h = harness(&db, Arc::new(NoopExecutor))?;

    let job = h.scheduler.enqueue(manual_request(uuid::Uuid::new_v4())).await?;
    // Simulate a worker that claimed the job and then died: running state
    // with a lease deadline already in the past.
    let past = Utc::now() - Duration::minutes(1);
    assert!(h.repository.claim(&job.id, JobStatus::Queued, past, past).await?);

    h.processor.tick().await?;
    let reclaimed = h.repository.find_by_id(&job.id).await?.unwrap();
    assert_ne!(reclaimed.status, JobStatus::Running);
    assert!(
        reclaimed.status == JobStatus::Retrying || reclaimed.status == JobStatus::Completed,
        "expected reclaim or re-execution, got {}",
        reclaimed.status
    );
    if reclaimed.status == JobStatus::Retrying {
        assert_eq!(reclaimed.retry_count, 1);
        assert_eq!(reclaimed.error_message.as_deref(), Some("lease expired"));
    }
    Ok(())
}

#[tokio::test]
async fn higher_priority_jobs_are_served_first() -> Result<()> {
    let db = test_database().await?;
    let h = harness(&db, Arc::new(NoopExecutor))?;

    let resource = uuid::Uuid::new_v4();
    let mut low = manual_request(resource);
    low.priority = 5;
    let mut high = manual_request(resource);
    high.priority = 8;
    // The lower-priority job is enqueued (and scheduled) first
    let low = h.scheduler.enqueue(low).await?;
    let high = h.scheduler.enqueue(high).await?;

    assert_eq!(h.processor.tick().await?, Some(high.id));
    assert_eq!(h.processor.tick().await?, Some(low.id));
    Ok(())
}

#[tokio::test]
async fn renewed_lease_blocks_reclaim() -> Result<()> {
    let db = test_database().await?;
    let h = harness(&db, Arc::new(NoopExecutor))?;

    let job = h.scheduler.enqueue(manual_request(uuid::Uuid::new_v4())).await?;
    let now = Utc::now();
    // Claimed with a lease deadline already in the past, as after a stall
    assert!(
        h.repository
            .claim(&job.id, JobStatus::Queued, now, now - Duration::minutes(1))
            .await?
    );
    assert_eq!(h.repository.find_expired_leases(now).await?.len(), 1);

    // The owner recovers and renews before anyone settles the job
    assert!(
        h.repository
            .update_progress(&job.id, 10, None, now + Duration::minutes(10))
            .await?
    );

    // A settle conditioned on the lease still being expired now loses
    assert!(
        !h.repository
            .schedule_retry(&job.id, now, "lease expired", now, Some(now))
            .await?
    );
    assert!(
        !h.repository
            .fail(&job.id, "lease expired", now, Some(now))
            .await?
    );
    let untouched = h.repository.find_by_id(&job.id).await?.unwrap();
    assert_eq!(untouched.status, JobStatus::Running);
    assert_eq!(untouched.retry_count, 0);
    assert_eq!(untouched.progress, 10);
    Ok(())
}
