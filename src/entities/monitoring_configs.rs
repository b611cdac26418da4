//! Monitoring config entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "monitoring_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    /// JSON array of target URLs, ordered
    pub targets: Json,
    /// hourly, daily, weekly
    pub schedule_interval: String,
    /// Optional cron expression overriding the interval
    pub schedule_cron: Option<String>,
    /// JSON object: metric name -> minimum acceptable score
    pub thresholds: Json,
    pub max_runs_per_day: i32,
    pub avoid_peak_hours: bool,
    /// "HH:MM:SS", interpreted in UTC
    pub peak_start: Option<String>,
    pub peak_end: Option<String>,
    pub last_run_at: Option<DateTimeUtc>,
    pub next_run_at: Option<DateTimeUtc>,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::monitoring_runs::Entity")]
    MonitoringRuns,
}

impl Related<super::monitoring_runs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonitoringRuns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
