//! The recurring monitor loop
//!
//! Wakes on a fixed interval, finds due configs and executes each as one
//! monitoring run: every target audited sequentially with a pause in between
//! (downstream audit APIs are rate limited), threshold breaches recorded as
//! alerts, metric averages computed over the targets that completed.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveTime, Utc};
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::{interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::MonitoringConfigSection;
use crate::database::repositories::{
    MonitoringConfigSeaOrmRepository, MonitoringRunSeaOrmRepository,
    ThresholdAlertSeaOrmRepository,
};
use crate::errors::{AdmissionError, AppError};
use crate::events::{EngineEvent, EventBroadcaster};
use crate::models::{MonitoringConfig, MonitoringRun, RunStatus, TriggerType};
use crate::monitoring::thresholds::{average_scores, severity_for};
use crate::monitoring::AuditExecutor;

/// Executes due monitoring configs and owns their schedule bookkeeping
pub struct RecurringMonitor {
    configs: MonitoringConfigSeaOrmRepository,
    runs: MonitoringRunSeaOrmRepository,
    alerts: ThresholdAlertSeaOrmRepository,
    auditor: Arc<dyn AuditExecutor>,
    broadcaster: Arc<EventBroadcaster>,
    tick_interval: std::time::Duration,
    target_delay: std::time::Duration,
    max_pending_runs: u64,
}

impl RecurringMonitor {
    pub fn new(
        configs: MonitoringConfigSeaOrmRepository,
        runs: MonitoringRunSeaOrmRepository,
        alerts: ThresholdAlertSeaOrmRepository,
        auditor: Arc<dyn AuditExecutor>,
        broadcaster: Arc<EventBroadcaster>,
        section: &MonitoringConfigSection,
    ) -> Result<Self> {
        Ok(Self {
            configs,
            runs,
            alerts,
            auditor,
            broadcaster,
            tick_interval: section.tick_interval()?,
            target_delay: section.target_delay()?,
            max_pending_runs: section.max_pending_runs,
        })
    }

    /// Process every config due at `now`; returns the IDs of runs executed
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let mut processed = Vec::new();
        let unfinished = self.runs.count_unfinished().await?;
        if unfinished >= self.max_pending_runs {
            warn!(
                unfinished,
                limit = self.max_pending_runs,
                "monitoring saturated, deferring due configs"
            );
            return Ok(processed);
        }

        for config in self.configs.find_due(now).await? {
            if self.daily_cap_reached(&config, now).await? {
                // next_run_at stays put; the config becomes eligible again
                // once the day rolls over
                debug!(config_id = %config.id, "daily run cap reached, skipping");
                continue;
            }
            if config.in_peak_window(now) {
                // Stay due and fire as soon as the window closes
                debug!(config_id = %config.id, "inside peak window, deferring");
                continue;
            }

            let run_result = self
                .execute_run(&config, TriggerType::Scheduled, now)
                .await;
            // Schedule bookkeeping happens even when the run errored, so a
            // permanently broken config cannot wedge the loop by staying due.
            let next_run_at = self.next_run_after(&config, now)?;
            self.configs
                .update_schedule(&config.id, now, next_run_at)
                .await?;

            match run_result {
                Ok(run) => processed.push(run.id),
                Err(e) => error!(config_id = %config.id, "monitoring run failed: {}", e),
            }
        }
        Ok(processed)
    }

    /// Register a new config; it becomes due immediately
    pub async fn create_config(
        &self,
        request: crate::models::MonitoringConfigCreateRequest,
    ) -> Result<MonitoringConfig, AppError> {
        if let Some(expr) = &request.schedule_cron {
            cron::Schedule::from_str(expr).map_err(|e| {
                AppError::validation(format!("invalid cron expression '{}': {}", expr, e))
            })?;
        }
        self.configs.create(request).await.map_err(internal)
    }

    /// Run one config immediately, outside its schedule
    ///
    /// Peak-hour avoidance only shapes the automatic schedule; an operator
    /// asking for a run now gets one. The daily cap and saturation guard
    /// still apply as admission-style refusals, and `next_run_at` is left
    /// untouched.
    pub async fn trigger_run(
        &self,
        config_id: &Uuid,
        trigger_type: TriggerType,
        now: DateTime<Utc>,
    ) -> Result<MonitoringRun, AppError> {
        match trigger_type {
            TriggerType::Manual | TriggerType::UpstreamEvent => {}
            other => {
                return Err(AppError::validation(format!(
                    "trigger_type '{}' cannot start a monitoring run",
                    other
                )));
            }
        }

        let config = self
            .configs
            .find_by_id(config_id)
            .await
            .map_err(internal)?
            .ok_or_else(|| AppError::not_found("monitoring_config", config_id.to_string()))?;

        let unfinished = self.runs.count_unfinished().await.map_err(internal)?;
        if unfinished >= self.max_pending_runs {
            return Err(AdmissionError::MonitorSaturated {
                unfinished,
                limit: self.max_pending_runs,
            }
            .into());
        }
        if self
            .daily_cap_reached(&config, now)
            .await
            .map_err(internal)?
        {
            return Err(AdmissionError::DailyCapReached {
                config_id: config.id.to_string(),
                cap: config.max_runs_per_day,
                retry_after_secs: seconds_until_next_day(now),
            }
            .into());
        }

        self.execute_run(&config, trigger_type, now)
            .await
            .map_err(internal)
    }

    /// Monitor loop; wakes every tick interval until the token fires
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        info!(tick_interval = ?self.tick_interval, "recurring monitor started");
        let mut ticker = interval(self.tick_interval);

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("recurring monitor received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!("monitor tick failed: {}", e);
                    }
                }
            }
        }
        Ok(())
    }

    async fn daily_cap_reached(
        &self,
        config: &MonitoringConfig,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let runs_today = self.runs.count_created_since(&config.id, day_start).await?;
        Ok(runs_today >= config.max_runs_per_day as u64)
    }

    /// Audit every target of the config as one run
    async fn execute_run(
        &self,
        config: &MonitoringConfig,
        trigger_type: TriggerType,
        now: DateTime<Utc>,
    ) -> Result<MonitoringRun> {
        let run = self
            .runs
            .create(&config.id, trigger_type, config.targets.len() as i32)
            .await?;
        info!(
            run_id = %run.id,
            config_id = %config.id,
            targets = config.targets.len(),
            trigger = %trigger_type,
            "monitoring run started"
        );
        self.broadcaster.publish_scoped(
            "monitoring",
            &config.id.to_string(),
            EngineEvent::new(
                "run_started",
                serde_json::json!({
                    "run_id": run.id,
                    "config_id": config.id,
                    "trigger": trigger_type,
                }),
            ),
        );

        let mut completed_results = Vec::new();
        let mut failed_targets = 0;

        for (index, target) in config.targets.iter().enumerate() {
            if index > 0 {
                sleep(self.target_delay).await;
            }
            match self.auditor.audit(target).await {
                Ok(scores) => {
                    self.record_breaches(config, &run.id, target, &scores)
                        .await?;
                    completed_results.push(scores);
                }
                Err(e) => {
                    warn!(
                        run_id = %run.id,
                        target = %target,
                        "target audit failed: {}", e
                    );
                    failed_targets += 1;
                }
            }
        }

        let averages = average_scores(&completed_results);
        // A run with at least one completed target still yields useful data
        let status = if completed_results.is_empty() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        let run = self
            .runs
            .finalize(
                &run.id,
                status,
                completed_results.len() as i32,
                failed_targets,
                averages.as_ref(),
            )
            .await?;

        info!(
            run_id = %run.id,
            status = %run.status,
            completed = run.completed_targets,
            failed = run.failed_targets,
            "monitoring run finished"
        );
        self.broadcaster.publish_scoped(
            "monitoring",
            &config.id.to_string(),
            EngineEvent::new(
                "run_completed",
                serde_json::json!({
                    "run_id": run.id,
                    "config_id": config.id,
                    "status": run.status,
                    "completed_targets": run.completed_targets,
                    "failed_targets": run.failed_targets,
                    "average_scores": run.average_scores,
                    "finished_at": now,
                }),
            ),
        );
        Ok(run)
    }

    /// Record an alert for every metric that fell below its threshold
    async fn record_breaches(
        &self,
        config: &MonitoringConfig,
        run_id: &Uuid,
        target: &str,
        scores: &std::collections::HashMap<String, f64>,
    ) -> Result<()> {
        for (metric, threshold) in &config.thresholds {
            let Some(score) = scores.get(metric) else {
                continue;
            };
            if score >= threshold {
                continue;
            }
            let severity = severity_for(threshold - score);
            let alert = self
                .alerts
                .create(run_id, target, metric, *score, *threshold, severity)
                .await?;
            warn!(
                run_id = %run_id,
                target = %target,
                metric = %metric,
                score = *score,
                threshold = *threshold,
                severity = %severity,
                "threshold breached"
            );
            self.broadcaster.publish_scoped(
                "monitoring",
                &config.id.to_string(),
                EngineEvent::new("alert", serde_json::to_value(&alert)?),
            );
        }
        Ok(())
    }

    /// Next due time, advanced from the previous schedule point so the
    /// cadence does not drift with execution latency
    fn next_run_after(&self, config: &MonitoringConfig, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        if let Some(expr) = &config.schedule_cron {
            let schedule = cron::Schedule::from_str(expr)
                .with_context(|| format!("invalid cron expression '{}'", expr))?;
            return schedule
                .after(&now)
                .next()
                .context("cron expression yields no future occurrence");
        }

        let step = config.schedule_interval.duration();
        let mut next = config.next_run_at.unwrap_or(now);
        while next <= now {
            next += step;
        }
        Ok(next)
    }
}

fn internal(error: anyhow::Error) -> AppError {
    AppError::internal(error.to_string())
}

/// Seconds until the UTC day rolls over and capped configs become eligible
fn seconds_until_next_day(now: DateTime<Utc>) -> u64 {
    let next_midnight = (now.date_naive() + chrono::Days::new(1))
        .and_time(NaiveTime::MIN)
        .and_utc();
    (next_midnight - now).num_seconds().max(0) as u64
}
