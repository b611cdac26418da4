//! SeaORM-based monitoring config repository

use anyhow::Result;
use chrono::{DateTime, NaiveTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{monitoring_configs, prelude::MonitoringConfigs};
use crate::errors::RepositoryError;
use crate::models::{MonitoringConfig, MonitoringConfigCreateRequest};

/// SeaORM-based repository for monitoring config operations
#[derive(Clone)]
pub struct MonitoringConfigSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl MonitoringConfigSeaOrmRepository {
    /// Create a new repository instance
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Create a monitoring config; due immediately (next_run_at = now)
    pub async fn create(
        &self,
        request: MonitoringConfigCreateRequest,
    ) -> Result<MonitoringConfig> {
        let now = Utc::now();
        let id = Uuid::new_v4();

        let active_model = monitoring_configs::ActiveModel {
            id: Set(id),
            project_id: Set(request.project_id),
            name: Set(request.name),
            targets: Set(serde_json::to_value(&request.targets)?),
            schedule_interval: Set(request.schedule_interval.to_string()),
            schedule_cron: Set(request.schedule_cron),
            thresholds: Set(serde_json::to_value(&request.thresholds)?),
            max_runs_per_day: Set(request.max_runs_per_day as i32),
            avoid_peak_hours: Set(request.avoid_peak_hours),
            peak_start: Set(request.peak_start.map(|t| t.to_string())),
            peak_end: Set(request.peak_end.map(|t| t.to_string())),
            last_run_at: Set(None),
            next_run_at: Set(Some(now)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model.insert(&*self.connection).await?;
        model_to_config(model)
    }

    /// Find a config by ID
    pub async fn find_by_id(&self, id: &Uuid) -> Result<Option<MonitoringConfig>> {
        let model = MonitoringConfigs::find_by_id(*id)
            .one(&*self.connection)
            .await?;
        model.map(model_to_config).transpose()
    }

    /// Find all active configs due at or before `now`, oldest first
    pub async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<MonitoringConfig>> {
        let models = MonitoringConfigs::find()
            .filter(monitoring_configs::Column::IsActive.eq(true))
            .filter(monitoring_configs::Column::NextRunAt.lte(now))
            .order_by_asc(monitoring_configs::Column::NextRunAt)
            .all(&*self.connection)
            .await?;
        models.into_iter().map(model_to_config).collect()
    }

    /// Record a run: set last_run_at and the recomputed next_run_at
    pub async fn update_schedule(
        &self,
        id: &Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = MonitoringConfigs::update_many()
            .col_expr(
                monitoring_configs::Column::LastRunAt,
                Expr::value(Some(last_run_at)),
            )
            .col_expr(
                monitoring_configs::Column::NextRunAt,
                Expr::value(Some(next_run_at)),
            )
            .col_expr(
                monitoring_configs::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(monitoring_configs::Column::Id.eq(*id))
            .exec(&*self.connection)
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::not_found("monitoring_config", id).into());
        }
        Ok(())
    }
}

/// Convert an entity row into the domain model
fn model_to_config(m: monitoring_configs::Model) -> Result<MonitoringConfig> {
    let schedule_interval =
        m.schedule_interval
            .parse()
            .map_err(|_| RepositoryError::InvalidStoredValue {
                field: "schedule_interval".to_string(),
                value: m.schedule_interval.clone(),
            })?;
    let targets: Vec<String> = serde_json::from_value(m.targets)?;
    let thresholds = serde_json::from_value(m.thresholds)?;
    let peak_start = parse_time(m.peak_start.as_deref())?;
    let peak_end = parse_time(m.peak_end.as_deref())?;

    Ok(MonitoringConfig {
        id: m.id,
        project_id: m.project_id,
        name: m.name,
        targets,
        schedule_interval,
        schedule_cron: m.schedule_cron,
        thresholds,
        max_runs_per_day: m.max_runs_per_day as u32,
        avoid_peak_hours: m.avoid_peak_hours,
        peak_start,
        peak_end,
        last_run_at: m.last_run_at,
        next_run_at: m.next_run_at,
        is_active: m.is_active,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn parse_time(value: Option<&str>) -> Result<Option<NaiveTime>> {
    match value {
        None => Ok(None),
        Some(text) => text
            .parse::<NaiveTime>()
            .map(Some)
            .map_err(|_| {
                RepositoryError::InvalidStoredValue {
                    field: "peak window".to_string(),
                    value: text.to_string(),
                }
                .into()
            }),
    }
}
