//! SeaORM entity definitions
//!
//! Persisted row shapes. Enum-typed columns are stored as strings and JSON
//! payloads as JSON columns; the repositories own the translation to and
//! from the domain models.

pub mod analysis_jobs;
pub mod monitoring_configs;
pub mod monitoring_runs;
pub mod prelude;
pub mod threshold_alerts;
