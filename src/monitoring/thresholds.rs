//! Threshold evaluation helpers

use std::collections::HashMap;

use crate::models::AlertSeverity;

/// Severity from how far a score fell below its threshold
///
/// Scores run 0-100, so the bands are absolute point differences.
pub fn severity_for(diff: f64) -> AlertSeverity {
    if diff > 30.0 {
        AlertSeverity::Critical
    } else if diff > 20.0 {
        AlertSeverity::High
    } else if diff > 10.0 {
        AlertSeverity::Medium
    } else {
        AlertSeverity::Low
    }
}

/// Per-metric mean over the completed targets only
///
/// Failed targets contribute nothing; a metric missing from one target is
/// averaged over the targets that reported it. Returns `None` when no target
/// completed.
pub fn average_scores(results: &[HashMap<String, f64>]) -> Option<HashMap<String, f64>> {
    if results.is_empty() {
        return None;
    }
    let mut sums: HashMap<String, (f64, u32)> = HashMap::new();
    for scores in results {
        for (metric, score) in scores {
            let entry = sums.entry(metric.clone()).or_insert((0.0, 0));
            entry.0 += score;
            entry.1 += 1;
        }
    }
    Some(
        sums.into_iter()
            .map(|(metric, (sum, count))| (metric, sum / count as f64))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_bands() {
        assert_eq!(severity_for(35.0), AlertSeverity::Critical);
        assert_eq!(severity_for(30.0), AlertSeverity::High);
        assert_eq!(severity_for(25.0), AlertSeverity::High);
        assert_eq!(severity_for(15.0), AlertSeverity::Medium);
        assert_eq!(severity_for(8.0), AlertSeverity::Low);
        assert_eq!(severity_for(0.5), AlertSeverity::Low);
    }

    #[test]
    fn averages_over_completed_targets() {
        let results = vec![
            HashMap::from([("performance".to_string(), 80.0), ("seo".to_string(), 90.0)]),
            HashMap::from([("performance".to_string(), 60.0), ("seo".to_string(), 70.0)]),
        ];
        let averages = average_scores(&results).unwrap();
        assert_eq!(averages["performance"], 70.0);
        assert_eq!(averages["seo"], 80.0);
    }

    #[test]
    fn missing_metric_averages_over_reporters() {
        let results = vec![
            HashMap::from([("performance".to_string(), 90.0)]),
            HashMap::from([("performance".to_string(), 70.0), ("seo".to_string(), 50.0)]),
        ];
        let averages = average_scores(&results).unwrap();
        assert_eq!(averages["performance"], 80.0);
        assert_eq!(averages["seo"], 50.0);
    }

    #[test]
    fn no_completed_targets_means_no_averages() {
        assert!(average_scores(&[]).is_none());
    }
}
