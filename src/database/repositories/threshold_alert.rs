//! SeaORM-based threshold alert repository (append-only)

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{prelude::ThresholdAlerts, threshold_alerts};
use crate::errors::RepositoryError;
use crate::models::{AlertSeverity, ThresholdAlert};

/// SeaORM-based repository for threshold alert operations
#[derive(Clone)]
pub struct ThresholdAlertSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl ThresholdAlertSeaOrmRepository {
    /// Create a new repository instance
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Record one threshold breach for a run target
    pub async fn create(
        &self,
        run_id: &Uuid,
        target: &str,
        metric_name: &str,
        current_score: f64,
        threshold_score: f64,
        severity: AlertSeverity,
    ) -> Result<ThresholdAlert> {
        let active_model = threshold_alerts::ActiveModel {
            id: Set(Uuid::new_v4()),
            run_id: Set(*run_id),
            target: Set(target.to_string()),
            metric_name: Set(metric_name.to_string()),
            current_score: Set(current_score),
            threshold_score: Set(threshold_score),
            severity: Set(severity.to_string()),
            created_at: Set(Utc::now()),
        };

        let model = active_model.insert(&*self.connection).await?;
        model_to_alert(model)
    }

    /// All alerts recorded for a run, oldest first
    pub async fn find_by_run(&self, run_id: &Uuid) -> Result<Vec<ThresholdAlert>> {
        let models = ThresholdAlerts::find()
            .filter(threshold_alerts::Column::RunId.eq(*run_id))
            .order_by_asc(threshold_alerts::Column::CreatedAt)
            .all(&*self.connection)
            .await?;
        models.into_iter().map(model_to_alert).collect()
    }
}

/// Convert an entity row into the domain model
fn model_to_alert(m: threshold_alerts::Model) -> Result<ThresholdAlert> {
    let severity = m
        .severity
        .parse()
        .map_err(|_| RepositoryError::InvalidStoredValue {
            field: "severity".to_string(),
            value: m.severity.clone(),
        })?;

    Ok(ThresholdAlert {
        id: m.id,
        run_id: m.run_id,
        target: m.target,
        metric_name: m.metric_name,
        current_score: m.current_score,
        threshold_score: m.threshold_score,
        severity,
        created_at: m.created_at,
    })
}
