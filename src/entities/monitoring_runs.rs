//! Monitoring run entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "monitoring_runs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub config_id: Uuid,
    /// manual, scheduled, upstream_event
    pub trigger_type: String,
    /// running, completed, failed
    pub status: String,
    pub total_targets: i32,
    pub completed_targets: i32,
    pub failed_targets: i32,
    /// JSON object: metric name -> mean over completed targets
    pub average_scores: Option<Json>,
    pub started_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::monitoring_configs::Entity",
        from = "Column::ConfigId",
        to = "super::monitoring_configs::Column::Id"
    )]
    MonitoringConfigs,
    #[sea_orm(has_many = "super::threshold_alerts::Entity")]
    ThresholdAlerts,
}

impl Related<super::monitoring_configs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonitoringConfigs.def()
    }
}

impl Related<super::threshold_alerts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ThresholdAlerts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
