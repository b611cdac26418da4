//! Job model and its supporting enums

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of a job
///
/// `queued → running → {completed | retrying | failed | cancelled}`;
/// a `retrying` job re-enters the claimable pool once its backoff delay
/// elapses. `completed`, `failed` and `cancelled` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal states are never transitioned out of
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// States counted against the per-resource concurrency cap
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running | Self::Retrying)
    }

    /// States from which a worker may claim the job (once `scheduled_at`
    /// has elapsed)
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Queued | Self::Retrying)
    }
}

/// Why a job was created
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Scheduled,
    UpstreamEvent,
    FileUpload,
}

/// Structured trigger payload, one closed variant per trigger type
///
/// Serialized into the job row's JSON column; the tag keeps new trigger
/// kinds exhaustiveness-checked instead of hiding behind an open schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerPayload {
    Manual {
        requested_by: String,
    },
    Scheduled {
        config_id: Uuid,
    },
    UpstreamEvent {
        event: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        commit_sha: Option<String>,
    },
    FileUpload {
        file_name: String,
        content_type: String,
    },
}

impl TriggerPayload {
    /// The trigger type this payload belongs to
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Self::Manual { .. } => TriggerType::Manual,
            Self::Scheduled { .. } => TriggerType::Scheduled,
            Self::UpstreamEvent { .. } => TriggerType::UpstreamEvent,
            Self::FileUpload { .. } => TriggerType::FileUpload,
        }
    }
}

/// One unit of admitted background work
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Job {
    pub id: Uuid,
    /// Owning entity the work is scoped to (a project)
    pub resource_id: Uuid,
    pub trigger_type: TriggerType,
    pub trigger_data: TriggerPayload,
    pub status: JobStatus,
    /// Higher priority is served first
    pub priority: i32,
    pub retry_count: i32,
    pub max_retries: i32,
    /// Earliest eligible execution time
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Lease deadline while running; expired leases are reclaimed
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// Percent complete, monotone within one attempt
    pub progress: i32,
    pub status_message: Option<String>,
    pub result_summary: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to enqueue a new job
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct JobCreateRequest {
    pub resource_id: Uuid,
    pub trigger_data: TriggerPayload,
    #[serde(default)]
    pub priority: i32,
    /// Defer execution until this time; defaults to now
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Override the configured retry budget
    pub max_retries: Option<i32>,
}

/// Per-status job counts for a resource
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct JobStats {
    pub total: u64,
    pub queued: u64,
    pub running: u64,
    pub retrying: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Retrying.is_terminal());
    }

    #[test]
    fn active_states_match_admission_counting() {
        for status in [JobStatus::Queued, JobStatus::Running, JobStatus::Retrying] {
            assert!(status.is_active());
        }
        for status in [
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert!(!status.is_active());
        }
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Retrying,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            let text = status.to_string();
            assert_eq!(text.parse::<JobStatus>().unwrap(), status);
        }
        assert_eq!(JobStatus::Retrying.to_string(), "retrying");
        assert_eq!(
            "upstream_event".parse::<TriggerType>().unwrap(),
            TriggerType::UpstreamEvent
        );
    }

    #[test]
    fn trigger_payload_is_tagged() {
        let payload = TriggerPayload::UpstreamEvent {
            event: "push".to_string(),
            commit_sha: Some("abc123".to_string()),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "upstream_event");
        assert_eq!(payload.trigger_type(), TriggerType::UpstreamEvent);

        let back: TriggerPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back, payload);
    }
}
