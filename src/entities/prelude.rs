//! Re-exports of entity types for convenient imports

pub use super::analysis_jobs::Entity as AnalysisJobs;
pub use super::monitoring_configs::Entity as MonitoringConfigs;
pub use super::monitoring_runs::Entity as MonitoringRuns;
pub use super::threshold_alerts::Entity as ThresholdAlerts;
