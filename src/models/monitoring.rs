//! Recurring monitoring models: configs, runs and threshold alerts

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use super::TriggerType;

/// How often a monitoring config is due
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScheduleInterval {
    Hourly,
    Daily,
    Weekly,
}

impl ScheduleInterval {
    /// One interval unit as a chrono duration
    pub fn duration(&self) -> Duration {
        match self {
            Self::Hourly => Duration::hours(1),
            Self::Daily => Duration::days(1),
            Self::Weekly => Duration::weeks(1),
        }
    }
}

/// Lifecycle state of one monitoring run
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Alert severity derived from how far a score fell below its threshold
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A recurring-audit definition
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MonitoringConfig {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    /// Ordered audit subjects (URLs)
    pub targets: Vec<String>,
    pub schedule_interval: ScheduleInterval,
    /// Optional cron expression overriding the fixed interval
    pub schedule_cron: Option<String>,
    /// Metric name → minimum acceptable score
    pub thresholds: HashMap<String, f64>,
    pub max_runs_per_day: u32,
    pub avoid_peak_hours: bool,
    /// Peak window `[peak_start, peak_end)`, may wrap midnight
    pub peak_start: Option<NaiveTime>,
    pub peak_end: Option<NaiveTime>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonitoringConfig {
    /// Whether the given instant falls inside the configured peak window
    pub fn in_peak_window(&self, now: DateTime<Utc>) -> bool {
        if !self.avoid_peak_hours {
            return false;
        }
        let (Some(start), Some(end)) = (self.peak_start, self.peak_end) else {
            return false;
        };
        let t = now.time();
        if start <= end {
            t >= start && t < end
        } else {
            // Window wraps midnight, e.g. 22:00..06:00
            t >= start || t < end
        }
    }
}

/// Request to create a monitoring config
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MonitoringConfigCreateRequest {
    pub project_id: Uuid,
    pub name: String,
    pub targets: Vec<String>,
    pub schedule_interval: ScheduleInterval,
    pub schedule_cron: Option<String>,
    #[serde(default)]
    pub thresholds: HashMap<String, f64>,
    pub max_runs_per_day: u32,
    #[serde(default)]
    pub avoid_peak_hours: bool,
    pub peak_start: Option<NaiveTime>,
    pub peak_end: Option<NaiveTime>,
}

/// One execution of a monitoring config
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MonitoringRun {
    pub id: Uuid,
    pub config_id: Uuid,
    pub trigger_type: TriggerType,
    pub status: RunStatus,
    pub total_targets: i32,
    pub completed_targets: i32,
    pub failed_targets: i32,
    /// Per-metric mean over completed targets only
    pub average_scores: Option<HashMap<String, f64>>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Emitted when a completed target's metric fell below its threshold
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ThresholdAlert {
    pub id: Uuid,
    pub run_id: Uuid,
    pub target: String,
    pub metric_name: String,
    pub current_score: f64,
    pub threshold_score: f64,
    pub severity: AlertSeverity,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config_with_window(start: &str, end: &str) -> MonitoringConfig {
        MonitoringConfig {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "test".to_string(),
            targets: vec!["https://example.com".to_string()],
            schedule_interval: ScheduleInterval::Daily,
            schedule_cron: None,
            thresholds: HashMap::new(),
            max_runs_per_day: 4,
            avoid_peak_hours: true,
            peak_start: Some(start.parse().unwrap()),
            peak_end: Some(end.parse().unwrap()),
            last_run_at: None,
            next_run_at: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).unwrap()
    }

    #[test]
    fn peak_window_simple() {
        let config = config_with_window("09:00:00", "17:00:00");
        assert!(config.in_peak_window(at(9, 0)));
        assert!(config.in_peak_window(at(12, 30)));
        assert!(!config.in_peak_window(at(17, 0)));
        assert!(!config.in_peak_window(at(8, 59)));
    }

    #[test]
    fn peak_window_wraps_midnight() {
        let config = config_with_window("22:00:00", "06:00:00");
        assert!(config.in_peak_window(at(23, 0)));
        assert!(config.in_peak_window(at(2, 0)));
        assert!(!config.in_peak_window(at(6, 0)));
        assert!(!config.in_peak_window(at(12, 0)));
    }

    #[test]
    fn peak_window_ignored_when_disabled() {
        let mut config = config_with_window("00:00:00", "23:59:00");
        config.avoid_peak_hours = false;
        assert!(!config.in_peak_window(at(12, 0)));
    }

    #[test]
    fn interval_durations() {
        assert_eq!(ScheduleInterval::Hourly.duration(), Duration::hours(1));
        assert_eq!(ScheduleInterval::Daily.duration(), Duration::days(1));
        assert_eq!(ScheduleInterval::Weekly.duration(), Duration::weeks(1));
    }

    #[test]
    fn severity_ordering() {
        assert!(AlertSeverity::Critical > AlertSeverity::High);
        assert!(AlertSeverity::High > AlertSeverity::Medium);
        assert!(AlertSeverity::Medium > AlertSeverity::Low);
    }
}
