//! SeaORM-based monitoring run repository

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{monitoring_runs, prelude::MonitoringRuns};
use crate::errors::RepositoryError;
use crate::models::{MonitoringRun, RunStatus, TriggerType};

/// SeaORM-based repository for monitoring run operations
#[derive(Clone)]
pub struct MonitoringRunSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl MonitoringRunSeaOrmRepository {
    /// Create a new repository instance
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Insert a run in `running` state
    pub async fn create(
        &self,
        config_id: &Uuid,
        trigger_type: TriggerType,
        total_targets: i32,
    ) -> Result<MonitoringRun> {
        let now = Utc::now();
        let active_model = monitoring_runs::ActiveModel {
            id: Set(Uuid::new_v4()),
            config_id: Set(*config_id),
            trigger_type: Set(trigger_type.to_string()),
            status: Set(RunStatus::Running.to_string()),
            total_targets: Set(total_targets),
            completed_targets: Set(0),
            failed_targets: Set(0),
            average_scores: Set(None),
            started_at: Set(now),
            completed_at: Set(None),
            created_at: Set(now),
        };

        let model = active_model.insert(&*self.connection).await?;
        model_to_run(model)
    }

    /// Find a run by ID
    pub async fn find_by_id(&self, id: &Uuid) -> Result<Option<MonitoringRun>> {
        let model = MonitoringRuns::find_by_id(*id).one(&*self.connection).await?;
        model.map(model_to_run).transpose()
    }

    /// Runs for a config, newest first
    pub async fn find_by_config(&self, config_id: &Uuid) -> Result<Vec<MonitoringRun>> {
        let models = MonitoringRuns::find()
            .filter(monitoring_runs::Column::ConfigId.eq(*config_id))
            .order_by_desc(monitoring_runs::Column::CreatedAt)
            .all(&*self.connection)
            .await?;
        models.into_iter().map(model_to_run).collect()
    }

    /// Count runs created for a config since `day_start` (daily run cap)
    pub async fn count_created_since(
        &self,
        config_id: &Uuid,
        day_start: DateTime<Utc>,
    ) -> Result<u64> {
        let count = MonitoringRuns::find()
            .filter(monitoring_runs::Column::ConfigId.eq(*config_id))
            .filter(monitoring_runs::Column::CreatedAt.gte(day_start))
            .count(&*self.connection)
            .await?;
        Ok(count)
    }

    /// Count runs still in `running` state across all configs
    pub async fn count_unfinished(&self) -> Result<u64> {
        let count = MonitoringRuns::find()
            .filter(monitoring_runs::Column::Status.eq(RunStatus::Running.to_string()))
            .count(&*self.connection)
            .await?;
        Ok(count)
    }

    /// Finalize a run with per-target tallies and metric averages
    pub async fn finalize(
        &self,
        id: &Uuid,
        status: RunStatus,
        completed_targets: i32,
        failed_targets: i32,
        average_scores: Option<&HashMap<String, f64>>,
    ) -> Result<MonitoringRun> {
        let model = MonitoringRuns::find_by_id(*id)
            .one(&*self.connection)
            .await?
            .ok_or_else(|| RepositoryError::not_found("monitoring_run", id))?;

        let mut active_model: monitoring_runs::ActiveModel = model.into();
        active_model.status = Set(status.to_string());
        active_model.completed_targets = Set(completed_targets);
        active_model.failed_targets = Set(failed_targets);
        active_model.average_scores = Set(average_scores
            .map(serde_json::to_value)
            .transpose()?);
        active_model.completed_at = Set(Some(Utc::now()));

        let model = active_model.update(&*self.connection).await?;
        model_to_run(model)
    }
}

/// Convert an entity row into the domain model
fn model_to_run(m: monitoring_runs::Model) -> Result<MonitoringRun> {
    let trigger_type = m
        .trigger_type
        .parse()
        .map_err(|_| RepositoryError::InvalidStoredValue {
            field: "trigger_type".to_string(),
            value: m.trigger_type.clone(),
        })?;
    let status = m
        .status
        .parse()
        .map_err(|_| RepositoryError::InvalidStoredValue {
            field: "status".to_string(),
            value: m.status.clone(),
        })?;
    let average_scores = m
        .average_scores
        .map(serde_json::from_value)
        .transpose()?;

    Ok(MonitoringRun {
        id: m.id,
        config_id: m.config_id,
        trigger_type,
        status,
        total_targets: m.total_targets,
        completed_targets: m.completed_targets,
        failed_targets: m.failed_targets,
        average_scores,
        started_at: m.started_at,
        completed_at: m.completed_at,
        created_at: m.created_at,
    })
}
