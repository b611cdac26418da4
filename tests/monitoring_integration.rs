//! Recurring monitoring tests: runs, thresholds, caps and schedule advance

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use audit_engine::{
    config::{DatabaseConfig, MonitoringConfigSection},
    database::{
        Database,
        repositories::{
            MonitoringConfigSeaOrmRepository, MonitoringRunSeaOrmRepository,
            ThresholdAlertSeaOrmRepository,
        },
    },
    errors::{AdmissionError, AppError},
    events::EventBroadcaster,
    models::{
        AlertSeverity, MonitoringConfigCreateRequest, RunStatus, ScheduleInterval, TriggerType,
    },
    monitoring::{AuditExecutor, FixedScoreAuditor, RecurringMonitor},
};

async fn test_database() -> Result<Database> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(5),
    };
    let db = Database::new(&config).await?;
    db.migrate().await?;
    Ok(db)
}

fn fast_section() -> MonitoringConfigSection {
    MonitoringConfigSection {
        tick_interval: "60s".to_string(),
        target_delay: "0s".to_string(),
        max_pending_runs: 25,
    }
}

struct Repos {
    configs: MonitoringConfigSeaOrmRepository,
    runs: MonitoringRunSeaOrmRepository,
    alerts: ThresholdAlertSeaOrmRepository,
}

fn repos(db: &Database) -> Repos {
    Repos {
        configs: MonitoringConfigSeaOrmRepository::new(db.connection()),
        runs: MonitoringRunSeaOrmRepository::new(db.connection()),
        alerts: ThresholdAlertSeaOrmRepository::new(db.connection()),
    }
}

fn monitor_with(db: &Database, auditor: Arc<dyn AuditExecutor>) -> Result<RecurringMonitor> {
    let r = repos(db);
    RecurringMonitor::new(
        r.configs,
        r.runs,
        r.alerts,
        auditor,
        Arc::new(EventBroadcaster::new(16)),
        &fast_section(),
    )
}

fn config_request(targets: Vec<&str>, thresholds: HashMap<String, f64>) -> MonitoringConfigCreateRequest {
    MonitoringConfigCreateRequest {
        project_id: Uuid::new_v4(),
        name: "nightly audit".to_string(),
        targets: targets.into_iter().map(str::to_string).collect(),
        schedule_interval: ScheduleInterval::Hourly,
        schedule_cron: None,
        thresholds,
        max_runs_per_day: 10,
        avoid_peak_hours: false,
        peak_start: None,
        peak_end: None,
    }
}

/// Auditor that fails for targets containing a marker substring
struct FlakyAuditor {
    scores: HashMap<String, f64>,
    fail_marker: &'static str,
}

#[async_trait]
impl AuditExecutor for FlakyAuditor {
    async fn audit(&self, target: &str) -> Result<HashMap<String, f64>> {
        if target.contains(self.fail_marker) {
            anyhow::bail!("audit backend refused {}", target);
        }
        Ok(self.scores.clone())
    }
}

#[tokio::test]
async fn due_config_produces_a_completed_run_with_averages() -> Result<()> {
    let db = test_database().await?;
    let scores = HashMap::from([("performance".to_string(), 80.0), ("seo".to_string(), 90.0)]);
    let monitor = monitor_with(&db, Arc::new(FixedScoreAuditor::new(scores)))?;
    let r = repos(&db);

    let config = monitor
        .create_config(config_request(
            vec!["https://a.example", "https://b.example"],
            HashMap::new(),
        ))
        .await?;

    let processed = monitor.tick(Utc::now()).await?;
    assert_eq!(processed.len(), 1);

    let run = r.runs.find_by_id(&processed[0]).await?.unwrap();
    assert_eq!(run.config_id, config.id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.total_targets, 2);
    assert_eq!(run.completed_targets, 2);
    assert_eq!(run.failed_targets, 0);
    let averages = run.average_scores.unwrap();
    assert_eq!(averages["performance"], 80.0);
    assert_eq!(averages["seo"], 90.0);
    assert!(run.completed_at.is_some());
    Ok(())
}

#[tokio::test]
async fn breached_thresholds_record_alerts_with_severity() -> Result<()> {
    let db = test_database().await?;
    let scores = HashMap::from([("performance".to_string(), 55.0), ("seo".to_string(), 95.0)]);
    let monitor = monitor_with(&db, Arc::new(FixedScoreAuditor::new(scores)))?;
    let r = repos(&db);

    // performance misses by 35 (critical); seo passes
    let thresholds = HashMap::from([("performance".to_string(), 90.0), ("seo".to_string(), 90.0)]);
    monitor
        .create_config(config_request(vec!["https://a.example"], thresholds))
        .await?;

    let processed = monitor.tick(Utc::now()).await?;
    let alerts = r.alerts.find_by_run(&processed[0]).await?;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].metric_name, "performance");
    assert_eq!(alerts[0].current_score, 55.0);
    assert_eq!(alerts[0].threshold_score, 90.0);
    assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    Ok(())
}

#[tokio::test]
async fn partial_failure_still_completes_with_partial_averages() -> Result<()> {
    let db = test_database().await?;
    let auditor = FlakyAuditor {
        scores: HashMap::from([("performance".to_string(), 70.0)]),
        fail_marker: "broken",
    };
    let monitor = monitor_with(&db, Arc::new(auditor))?;
    let r = repos(&db);

    monitor
        .create_config(config_request(
            vec!["https://ok-1.example", "https://broken.example", "https://ok-2.example"],
            HashMap::new(),
        ))
        .await?;

    let processed = monitor.tick(Utc::now()).await?;
    let run = r.runs.find_by_id(&processed[0]).await?.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.completed_targets, 2);
    assert_eq!(run.failed_targets, 1);
    assert_eq!(run.average_scores.unwrap()["performance"], 70.0);
    Ok(())
}

#[tokio::test]
async fn run_fails_when_every_target_fails() -> Result<()> {
    let db = test_database().await?;
    let auditor = FlakyAuditor {
        scores: HashMap::new(),
        fail_marker: "example",
    };
    let monitor = monitor_with(&db, Arc::new(auditor))?;
    let r = repos(&db);

    monitor
        .create_config(config_request(vec!["https://a.example"], HashMap::new()))
        .await?;

    let processed = monitor.tick(Utc::now()).await?;
    let run = r.runs.find_by_id(&processed[0]).await?.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.completed_targets, 0);
    assert!(run.average_scores.is_none());
    Ok(())
}

#[tokio::test]
async fn schedule_advances_without_drift() -> Result<()> {
    let db = test_database().await?;
    let monitor = monitor_with(&db, Arc::new(FixedScoreAuditor::new(HashMap::new())))?;
    let r = repos(&db);

    let config = monitor
        .create_config(config_request(vec!["https://a.example"], HashMap::new()))
        .await?;
    let initial_due = config.next_run_at.unwrap();

    let now = Utc::now();
    monitor.tick(now).await?;

    let updated = r.configs.find_by_id(&config.id).await?.unwrap();
    let next = updated.next_run_at.unwrap();
    assert!(next > now);
    // Advanced from the previous due time in whole hourly steps
    let offset_ms = (next - initial_due).num_milliseconds();
    assert_eq!(offset_ms % Duration::hours(1).num_milliseconds(), 0);
    let last_run_at = updated.last_run_at.unwrap();
    assert!((last_run_at - now).abs() < Duration::seconds(1));

    // No longer due
    assert!(monitor.tick(now).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn daily_cap_blocks_further_runs_without_advancing_schedule() -> Result<()> {
    let db = test_database().await?;
    let monitor = monitor_with(&db, Arc::new(FixedScoreAuditor::new(HashMap::new())))?;
    let r = repos(&db);

    let mut request = config_request(vec!["https://a.example"], HashMap::new());
    request.max_runs_per_day = 1;
    let config = monitor.create_config(request).await?;

    let processed = monitor.tick(Utc::now()).await?;
    assert_eq!(processed.len(), 1);

    // Force the config due again; the cap must now hold it back
    let due_again = Utc::now() - Duration::minutes(1);
    r.configs
        .update_schedule(&config.id, Utc::now(), due_again)
        .await?;
    let held_back = monitor.tick(Utc::now()).await?;
    assert!(held_back.is_empty());
    let unchanged = r.configs.find_by_id(&config.id).await?.unwrap();
    let next_run_at = unchanged.next_run_at.unwrap();
    assert!((next_run_at - due_again).abs() < Duration::seconds(1));

    // Manual triggers honor the cap too, refused as a rate-style admission
    // error carrying the time to the day rollover
    let err = monitor
        .trigger_run(&config.id, TriggerType::Manual, Utc::now())
        .await
        .unwrap_err();
    match err {
        AppError::Admission(AdmissionError::DailyCapReached {
            cap,
            retry_after_secs,
            ..
        }) => {
            assert_eq!(cap, 1);
            assert!(retry_after_secs <= 86_400);
        }
        other => panic!("expected a daily-cap admission refusal, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn peak_window_defers_scheduled_runs_but_not_manual_ones() -> Result<()> {
    let db = test_database().await?;
    let monitor = monitor_with(&db, Arc::new(FixedScoreAuditor::new(HashMap::new())))?;
    let r = repos(&db);

    let mut request = config_request(vec!["https://a.example"], HashMap::new());
    request.avoid_peak_hours = true;
    // Window spans the whole day, so any tick lands inside it
    request.peak_start = Some("00:00:00".parse()?);
    request.peak_end = Some("23:59:59".parse()?);
    let config = monitor.create_config(request).await?;

    let processed = monitor.tick(Utc::now()).await?;
    assert!(processed.is_empty());
    // Still due: the schedule was not advanced past the window
    let unchanged = r.configs.find_by_id(&config.id).await?.unwrap();
    assert!(unchanged.next_run_at.unwrap() <= Utc::now());

    // An operator override runs regardless of the window
    let run = monitor
        .trigger_run(&config.id, TriggerType::Manual, Utc::now())
        .await?;
    assert_eq!(run.config_id, config.id);
    Ok(())
}

#[tokio::test]
async fn upstream_event_trigger_records_its_trigger_type() -> Result<()> {
    let db = test_database().await?;
    let monitor = monitor_with(&db, Arc::new(FixedScoreAuditor::new(HashMap::new())))?;
    let r = repos(&db);

    let config = monitor
        .create_config(config_request(vec!["https://a.example"], HashMap::new()))
        .await?;

    let run = monitor
        .trigger_run(&config.id, TriggerType::UpstreamEvent, Utc::now())
        .await?;
    let stored = r.runs.find_by_id(&run.id).await?.unwrap();
    assert_eq!(stored.trigger_type, TriggerType::UpstreamEvent);
    Ok(())
}

#[tokio::test]
async fn scheduled_trigger_type_is_reserved_for_the_loop() -> Result<()> {
    let db = test_database().await?;
    let monitor = monitor_with(&db, Arc::new(FixedScoreAuditor::new(HashMap::new())))?;

    let config = monitor
        .create_config(config_request(vec!["https://a.example"], HashMap::new()))
        .await?;

    let err = monitor
        .trigger_run(&config.id, TriggerType::Scheduled, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
    Ok(())
}

#[tokio::test]
async fn unknown_config_cannot_be_triggered() -> Result<()> {
    let db = test_database().await?;
    let monitor = monitor_with(&db, Arc::new(FixedScoreAuditor::new(HashMap::new())))?;

    let err = monitor
        .trigger_run(&Uuid::new_v4(), TriggerType::Manual, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn invalid_cron_expression_is_rejected_at_creation() -> Result<()> {
    let db = test_database().await?;
    let monitor = monitor_with(&db, Arc::new(FixedScoreAuditor::new(HashMap::new())))?;

    let mut request = config_request(vec!["https://a.example"], HashMap::new());
    request.schedule_cron = Some("not a cron".to_string());
    let err = monitor.create_config(request).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
    Ok(())
}
