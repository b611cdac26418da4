//! SeaORM repository implementations
//!
//! Repositories own the translation between persisted entity rows and the
//! domain models, and contain every conditional (optimistic) update the
//! engine relies on for multi-worker correctness.

pub mod job;
pub mod monitoring_config;
pub mod monitoring_run;
pub mod threshold_alert;

// Re-export for convenience
pub use job::JobSeaOrmRepository;
pub use monitoring_config::MonitoringConfigSeaOrmRepository;
pub use monitoring_run::MonitoringRunSeaOrmRepository;
pub use threshold_alert::ThresholdAlertSeaOrmRepository;
