//! SeaORM-based job repository
//!
//! The job row is the only shared mutable resource in the engine, so every
//! state transition here is a conditional update keyed on the expected prior
//! status ("update where id = ? and status = ?"). Callers learn whether they
//! won the transition from the returned bool; a lost race is not an error.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{analysis_jobs, prelude::AnalysisJobs};
use crate::errors::RepositoryError;
use crate::models::{Job, JobStats, JobStatus, TriggerPayload};

/// Fields required to insert a new job row
#[derive(Debug, Clone)]
pub struct NewJob {
    pub resource_id: Uuid,
    pub trigger_data: TriggerPayload,
    pub priority: i32,
    pub max_retries: i32,
    pub scheduled_at: DateTime<Utc>,
}

/// SeaORM-based repository for job operations
#[derive(Clone)]
pub struct JobSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl JobSeaOrmRepository {
    /// Create a new repository instance
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Insert a new job in `queued` state
    pub async fn create(&self, new_job: NewJob) -> Result<Job> {
        let now = Utc::now();
        let id = Uuid::new_v4();

        let active_model = analysis_jobs::ActiveModel {
            id: Set(id),
            resource_id: Set(new_job.resource_id),
            trigger_type: Set(new_job.trigger_data.trigger_type().to_string()),
            trigger_data: Set(serde_json::to_value(&new_job.trigger_data)?),
            status: Set(JobStatus::Queued.to_string()),
            priority: Set(new_job.priority),
            retry_count: Set(0),
            max_retries: Set(new_job.max_retries),
            scheduled_at: Set(new_job.scheduled_at),
            started_at: Set(None),
            completed_at: Set(None),
            lease_expires_at: Set(None),
            progress: Set(0),
            status_message: Set(None),
            result_summary: Set(None),
            error_message: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model.insert(&*self.connection).await?;
        model_to_job(model)
    }

    /// Find a job by ID
    pub async fn find_by_id(&self, id: &Uuid) -> Result<Option<Job>> {
        let model = AnalysisJobs::find_by_id(*id).one(&*self.connection).await?;
        model.map(model_to_job).transpose()
    }

    /// Find all jobs for a resource, newest first
    pub async fn find_by_resource(&self, resource_id: &Uuid) -> Result<Vec<Job>> {
        let models = AnalysisJobs::find()
            .filter(analysis_jobs::Column::ResourceId.eq(*resource_id))
            .order_by_desc(analysis_jobs::Column::CreatedAt)
            .all(&*self.connection)
            .await?;
        models.into_iter().map(model_to_job).collect()
    }

    /// Count jobs for a resource in {queued, running, retrying}
    pub async fn count_active_for_resource(&self, resource_id: &Uuid) -> Result<u64> {
        let count = AnalysisJobs::find()
            .filter(analysis_jobs::Column::ResourceId.eq(*resource_id))
            .filter(analysis_jobs::Column::Status.is_in(active_status_strings()))
            .count(&*self.connection)
            .await?;
        Ok(count)
    }

    /// Count pending (claimable) jobs across all resources
    pub async fn count_pending(&self) -> Result<u64> {
        let count = AnalysisJobs::find()
            .filter(analysis_jobs::Column::Status.is_in(claimable_status_strings()))
            .count(&*self.connection)
            .await?;
        Ok(count)
    }

    /// Fetch jobs eligible for claiming: claimable status and due
    ///
    /// The batch is pre-ordered by the store for stability, but the final
    /// dequeue ordering decision belongs to the explicit comparator in the
    /// processor, not to store-level sort semantics.
    pub async fn find_claimable(&self, now: DateTime<Utc>, limit: u64) -> Result<Vec<Job>> {
        let models = AnalysisJobs::find()
            .filter(analysis_jobs::Column::Status.is_in(claimable_status_strings()))
            .filter(analysis_jobs::Column::ScheduledAt.lte(now))
            .order_by_desc(analysis_jobs::Column::Priority)
            .order_by_asc(analysis_jobs::Column::ScheduledAt)
            .limit(limit)
            .all(&*self.connection)
            .await?;
        models.into_iter().map(model_to_job).collect()
    }

    /// Atomically claim a job for execution
    ///
    /// Conditional on the job still being in `expected` state so two
    /// concurrent workers cannot both claim it. Returns true if this
    /// caller won the claim.
    pub async fn claim(
        &self,
        id: &Uuid,
        expected: JobStatus,
        now: DateTime<Utc>,
        lease_expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = AnalysisJobs::update_many()
            .col_expr(
                analysis_jobs::Column::Status,
                Expr::value(JobStatus::Running.to_string()),
            )
            .col_expr(analysis_jobs::Column::StartedAt, Expr::value(Some(now)))
            .col_expr(
                analysis_jobs::Column::LeaseExpiresAt,
                Expr::value(Some(lease_expires_at)),
            )
            .col_expr(analysis_jobs::Column::Progress, Expr::value(0))
            .col_expr(
                analysis_jobs::Column::StatusMessage,
                Expr::value(Option::<String>::None),
            )
            .col_expr(analysis_jobs::Column::UpdatedAt, Expr::value(now))
            .filter(analysis_jobs::Column::Id.eq(*id))
            .filter(analysis_jobs::Column::Status.eq(expected.to_string()))
            .exec(&*self.connection)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Update progress for a running job and renew its lease
    ///
    /// Progress is monotone within an attempt: the update is conditional on
    /// the stored progress not exceeding the reported one.
    pub async fn update_progress(
        &self,
        id: &Uuid,
        progress: i32,
        message: Option<&str>,
        lease_expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = AnalysisJobs::update_many()
            .col_expr(analysis_jobs::Column::Progress, Expr::value(progress))
            .col_expr(
                analysis_jobs::Column::StatusMessage,
                Expr::value(message.map(str::to_string)),
            )
            .col_expr(
                analysis_jobs::Column::LeaseExpiresAt,
                Expr::value(Some(lease_expires_at)),
            )
            .col_expr(analysis_jobs::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(analysis_jobs::Column::Id.eq(*id))
            .filter(analysis_jobs::Column::Status.eq(JobStatus::Running.to_string()))
            .filter(analysis_jobs::Column::Progress.lte(progress))
            .exec(&*self.connection)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Transition a running job to `completed` with its result summary
    pub async fn complete(
        &self,
        id: &Uuid,
        result_summary: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = AnalysisJobs::update_many()
            .col_expr(
                analysis_jobs::Column::Status,
                Expr::value(JobStatus::Completed.to_string()),
            )
            .col_expr(analysis_jobs::Column::Progress, Expr::value(100))
            .col_expr(analysis_jobs::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(
                analysis_jobs::Column::LeaseExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(
                analysis_jobs::Column::ResultSummary,
                Expr::value(Some(result_summary)),
            )
            .col_expr(
                analysis_jobs::Column::ErrorMessage,
                Expr::value(Option::<String>::None),
            )
            .col_expr(analysis_jobs::Column::UpdatedAt, Expr::value(now))
            .filter(analysis_jobs::Column::Id.eq(*id))
            .filter(analysis_jobs::Column::Status.eq(JobStatus::Running.to_string()))
            .exec(&*self.connection)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Transition a running job to `retrying`, deferred by the backoff delay
    ///
    /// When `lease_expired_before` is set the transition additionally
    /// requires the lease to still be expired at that instant, so a reaper
    /// cannot yank a job whose owner renewed between scan and settle.
    pub async fn schedule_retry(
        &self,
        id: &Uuid,
        next_attempt_at: DateTime<Utc>,
        error_message: &str,
        now: DateTime<Utc>,
        lease_expired_before: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let mut query = AnalysisJobs::update_many()
            .col_expr(
                analysis_jobs::Column::Status,
                Expr::value(JobStatus::Retrying.to_string()),
            )
            .col_expr(
                analysis_jobs::Column::RetryCount,
                Expr::col(analysis_jobs::Column::RetryCount).add(1),
            )
            .col_expr(
                analysis_jobs::Column::ScheduledAt,
                Expr::value(next_attempt_at),
            )
            .col_expr(analysis_jobs::Column::Progress, Expr::value(0))
            .col_expr(
                analysis_jobs::Column::LeaseExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(
                analysis_jobs::Column::ErrorMessage,
                Expr::value(Some(error_message.to_string())),
            )
            .col_expr(analysis_jobs::Column::UpdatedAt, Expr::value(now))
            .filter(analysis_jobs::Column::Id.eq(*id))
            .filter(analysis_jobs::Column::Status.eq(JobStatus::Running.to_string()));
        if let Some(deadline) = lease_expired_before {
            query = query.filter(analysis_jobs::Column::LeaseExpiresAt.lt(deadline));
        }
        let result = query.exec(&*self.connection).await?;

        Ok(result.rows_affected == 1)
    }

    /// Transition a running job to terminal `failed`
    ///
    /// `lease_expired_before` has the same reap-guard semantics as on
    /// [`Self::schedule_retry`].
    pub async fn fail(
        &self,
        id: &Uuid,
        error_message: &str,
        now: DateTime<Utc>,
        lease_expired_before: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let mut query = AnalysisJobs::update_many()
            .col_expr(
                analysis_jobs::Column::Status,
                Expr::value(JobStatus::Failed.to_string()),
            )
            .col_expr(analysis_jobs::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(
                analysis_jobs::Column::LeaseExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(
                analysis_jobs::Column::ErrorMessage,
                Expr::value(Some(error_message.to_string())),
            )
            .col_expr(analysis_jobs::Column::UpdatedAt, Expr::value(now))
            .filter(analysis_jobs::Column::Id.eq(*id))
            .filter(analysis_jobs::Column::Status.eq(JobStatus::Running.to_string()));
        if let Some(deadline) = lease_expired_before {
            query = query.filter(analysis_jobs::Column::LeaseExpiresAt.lt(deadline));
        }
        let result = query.exec(&*self.connection).await?;

        Ok(result.rows_affected == 1)
    }

    /// Cancel a job that has not started running yet
    pub async fn cancel_pending(&self, id: &Uuid, now: DateTime<Utc>) -> Result<bool> {
        let result = AnalysisJobs::update_many()
            .col_expr(
                analysis_jobs::Column::Status,
                Expr::value(JobStatus::Cancelled.to_string()),
            )
            .col_expr(analysis_jobs::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(analysis_jobs::Column::UpdatedAt, Expr::value(now))
            .filter(analysis_jobs::Column::Id.eq(*id))
            .filter(analysis_jobs::Column::Status.is_in(claimable_status_strings()))
            .exec(&*self.connection)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Finalize cancellation of a running job after its executor stopped
    pub async fn cancel_running(&self, id: &Uuid, now: DateTime<Utc>) -> Result<bool> {
        let result = AnalysisJobs::update_many()
            .col_expr(
                analysis_jobs::Column::Status,
                Expr::value(JobStatus::Cancelled.to_string()),
            )
            .col_expr(analysis_jobs::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(
                analysis_jobs::Column::LeaseExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(analysis_jobs::Column::UpdatedAt, Expr::value(now))
            .filter(analysis_jobs::Column::Id.eq(*id))
            .filter(analysis_jobs::Column::Status.eq(JobStatus::Running.to_string()))
            .exec(&*self.connection)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Find running jobs whose lease deadline has passed
    pub async fn find_expired_leases(&self, now: DateTime<Utc>) -> Result<Vec<Job>> {
        let models = AnalysisJobs::find()
            .filter(analysis_jobs::Column::Status.eq(JobStatus::Running.to_string()))
            .filter(analysis_jobs::Column::LeaseExpiresAt.lt(now))
            .all(&*self.connection)
            .await?;
        models.into_iter().map(model_to_job).collect()
    }

    /// Per-status job counts for one resource
    pub async fn stats_for_resource(&self, resource_id: &Uuid) -> Result<JobStats> {
        let rows: Vec<(String, i64)> = AnalysisJobs::find()
            .select_only()
            .column(analysis_jobs::Column::Status)
            .column_as(analysis_jobs::Column::Id.count(), "count")
            .filter(analysis_jobs::Column::ResourceId.eq(*resource_id))
            .group_by(analysis_jobs::Column::Status)
            .into_tuple()
            .all(&*self.connection)
            .await?;

        let mut stats = JobStats::default();
        for (status, count) in rows {
            let count = count as u64;
            stats.total += count;
            match status.parse::<JobStatus>().map_err(|_| {
                RepositoryError::InvalidStoredValue {
                    field: "status".to_string(),
                    value: status.clone(),
                }
            })? {
                JobStatus::Queued => stats.queued = count,
                JobStatus::Running => stats.running = count,
                JobStatus::Retrying => stats.retrying = count,
                JobStatus::Completed => stats.completed = count,
                JobStatus::Failed => stats.failed = count,
                JobStatus::Cancelled => stats.cancelled = count,
            }
        }
        Ok(stats)
    }
}

fn active_status_strings() -> Vec<String> {
    [JobStatus::Queued, JobStatus::Running, JobStatus::Retrying]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn claimable_status_strings() -> Vec<String> {
    [JobStatus::Queued, JobStatus::Retrying]
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Convert an entity row into the domain model
fn model_to_job(m: analysis_jobs::Model) -> Result<Job> {
    let status =
        m.status
            .parse::<JobStatus>()
            .map_err(|_| RepositoryError::InvalidStoredValue {
                field: "status".to_string(),
                value: m.status.clone(),
            })?;
    let trigger_type =
        m.trigger_type
            .parse()
            .map_err(|_| RepositoryError::InvalidStoredValue {
                field: "trigger_type".to_string(),
                value: m.trigger_type.clone(),
            })?;
    let trigger_data: TriggerPayload = serde_json::from_value(m.trigger_data)?;

    Ok(Job {
        id: m.id,
        resource_id: m.resource_id,
        trigger_type,
        trigger_data,
        status,
        priority: m.priority,
        retry_count: m.retry_count,
        max_retries: m.max_retries,
        scheduled_at: m.scheduled_at,
        started_at: m.started_at,
        completed_at: m.completed_at,
        lease_expires_at: m.lease_expires_at,
        progress: m.progress,
        status_message: m.status_message,
        result_summary: m.result_summary,
        error_message: m.error_message,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}
