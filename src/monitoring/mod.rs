//! Recurring monitoring: scheduled multi-target audits with threshold alerts

pub mod monitor;
pub mod thresholds;

use async_trait::async_trait;
use std::collections::HashMap;

pub use monitor::RecurringMonitor;
pub use thresholds::{average_scores, severity_for};

/// Produces metric scores (0-100) for one audit target
#[async_trait]
pub trait AuditExecutor: Send + Sync {
    async fn audit(&self, target: &str) -> anyhow::Result<HashMap<String, f64>>;
}

/// Auditor that returns the same scores for every target
///
/// Wiring default until a real audit backend is plugged in; also the
/// test stand-in.
pub struct FixedScoreAuditor {
    scores: HashMap<String, f64>,
}

impl FixedScoreAuditor {
    pub fn new(scores: HashMap<String, f64>) -> Self {
        Self { scores }
    }
}

#[async_trait]
impl AuditExecutor for FixedScoreAuditor {
    async fn audit(&self, _target: &str) -> anyhow::Result<HashMap<String, f64>> {
        Ok(self.scores.clone())
    }
}
