//! Threshold alert entity (append-only)

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "threshold_alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub run_id: Uuid,
    pub target: String,
    pub metric_name: String,
    pub current_score: f64,
    pub threshold_score: f64,
    /// low, medium, high, critical
    pub severity: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::monitoring_runs::Entity",
        from = "Column::RunId",
        to = "super::monitoring_runs::Column::Id"
    )]
    MonitoringRuns,
}

impl Related<super::monitoring_runs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonitoringRuns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
