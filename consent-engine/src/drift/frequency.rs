//! Frequency escalation: more actions in each successive period.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use ledger_chain::ActionRecord;

use crate::config::DriftConfig;
use crate::drift::{strictly_increasing, DriftInput, PatternDetector};
use crate::types::{PatternType, ScopeCreepPattern};

/// Index of the fixed-width period containing `at`.
///
/// Periods are aligned to the Unix epoch, so the same timestamp always lands in
/// the same bucket regardless of when counting starts.
pub fn period_bucket(at: DateTime<Utc>, window_secs: i64) -> i64 {
    at.timestamp().div_euclid(window_secs.max(1))
}

/// Reports authorisations whose per-period action counts rise at every step.
pub struct FrequencyEscalationDetector {
    min_buckets: usize,
    window_secs: i64,
}

impl FrequencyEscalationDetector {
    pub fn new(config: &DriftConfig) -> Self {
        Self {
            min_buckets: config.min_data_points,
            window_secs: config.window_secs(),
        }
    }
}

impl PatternDetector for FrequencyEscalationDetector {
    fn name(&self) -> &str {
        "frequency_escalation_detector"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::FrequencyEscalation
    }

    fn detect(&self, input: &DriftInput<'_>) -> Vec<ScopeCreepPattern> {
        let mut patterns = Vec::new();

        for (auth_id, actions) in input.actions_by_authorisation() {
            let mut buckets: BTreeMap<i64, Vec<&ActionRecord>> = BTreeMap::new();
            for action in actions {
                buckets
                    .entry(period_bucket(action.created_at, self.window_secs))
                    .or_default()
                    .push(action);
            }

            if buckets.len() < self.min_buckets {
                continue;
            }
            let counts: Vec<usize> = buckets.values().map(Vec::len).collect();
            if !strictly_increasing(&counts) {
                continue;
            }
            let last = counts.last().copied().unwrap_or_default();

            let evidence: Vec<&ActionRecord> = buckets.into_values().flatten().collect();
            let description = format!(
                "Actions under authorisation '{}' increased in each of {} periods (counts {:?})",
                auth_id,
                counts.len(),
                counts
            );
            patterns.extend(ScopeCreepPattern::from_evidence(
                PatternType::FrequencyEscalation,
                auth_id,
                Some(auth_id),
                description,
                &evidence,
                (0.2 + last as f64 / 10.0).min(0.9),
            ));
        }

        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::fixtures::*;
    use chrono::Duration;
    use serde_json::json;
    use std::collections::HashMap;

    fn run(per_day: &[usize]) -> Vec<ScopeCreepPattern> {
        let auth = authorisation(vec![]);
        let mut actions = Vec::new();
        for (day, count) in per_day.iter().enumerate() {
            for n in 0..*count {
                let at = start() + Duration::days(day as i64) + Duration::minutes(n as i64);
                actions.push(action(&auth.id, at, json!({})));
            }
        }
        let violations = HashMap::new();
        let statuses = HashMap::new();
        let input = DriftInput {
            authorisations: std::slice::from_ref(&auth),
            actions: &actions,
            violations: &violations,
            statuses: &statuses,
        };
        FrequencyEscalationDetector::new(&DriftConfig::default()).detect(&input)
    }

    #[test]
    fn test_period_bucket() {
        let day = 86_400;
        let at = start();
        assert_eq!(period_bucket(at, day), period_bucket(at + Duration::hours(1), day));
        assert_eq!(period_bucket(at, day) + 1, period_bucket(at + Duration::days(1), day));
    }

    #[test]
    fn test_escalating_counts_detected() {
        let patterns = run(&[1, 2, 4]);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].evidence.len(), 7);
        assert!((patterns[0].severity - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_flat_counts_ignored() {
        assert!(run(&[2, 2, 3]).is_empty());
    }

    #[test]
    fn test_too_few_periods() {
        assert!(run(&[1, 5]).is_empty());
    }

    #[test]
    fn test_empty_days_are_skipped() {
        // Buckets are only the non-empty periods.
        let patterns = run(&[1, 0, 2, 0, 3]);
        assert_eq!(patterns.len(), 1);
    }

    #[test]
    fn test_severity_capped() {
        let patterns = run(&[1, 5, 9]);
        assert!((patterns[0].severity - 0.9).abs() < 1e-9);
    }
}
