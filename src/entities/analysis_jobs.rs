//! Analysis job entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "analysis_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Owning project the job is scoped to
    pub resource_id: Uuid,
    /// manual, scheduled, upstream_event, file_upload
    pub trigger_type: String,
    /// Tagged trigger payload
    pub trigger_data: Json,
    /// queued, running, retrying, completed, failed, cancelled
    pub status: String,
    pub priority: i32,
    pub retry_count: i32,
    pub max_retries: i32,
    pub scheduled_at: DateTimeUtc,
    pub started_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
    /// Set while running; expired leases are reclaimed by the reaper
    pub lease_expires_at: Option<DateTimeUtc>,
    pub progress: i32,
    pub status_message: Option<String>,
    pub result_summary: Option<Json>,
    pub error_message: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
