//! Constraint erosion: violations of one kind growing more severe.

use std::collections::BTreeMap;

use ledger_chain::ActionRecord;

use crate::config::DriftConfig;
use crate::drift::{strictly_increasing, DriftInput, PatternDetector};
use crate::types::{PatternType, ScopeCreepPattern, ViolationSeverity, ViolationType};

const EROSION_SEVERITY: f64 = 0.7;

/// Reports violation types whose severity rises at every occurrence across the
/// whole history. Reads violations from a prior matcher pass.
pub struct ConstraintErosionDetector {
    min_data_points: usize,
}

impl ConstraintErosionDetector {
    pub fn new(config: &DriftConfig) -> Self {
        Self {
            min_data_points: config.min_data_points,
        }
    }
}

impl PatternDetector for ConstraintErosionDetector {
    fn name(&self) -> &str {
        "constraint_erosion_detector"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::ConstraintErosion
    }

    fn detect(&self, input: &DriftInput<'_>) -> Vec<ScopeCreepPattern> {
        let mut by_type: BTreeMap<ViolationType, Vec<(&ActionRecord, ViolationSeverity)>> =
            BTreeMap::new();

        for action in input.actions_chronological() {
            let Some(violations) = input.violations.get(&action.id) else {
                continue;
            };
            for violation in violations {
                by_type
                    .entry(violation.constraint_type)
                    .or_default()
                    .push((action, violation.severity));
            }
        }

        let mut patterns = Vec::new();
        for (violation_type, occurrences) in by_type {
            if occurrences.len() < self.min_data_points {
                continue;
            }
            let severities: Vec<ViolationSeverity> =
                occurrences.iter().map(|(_, s)| *s).collect();
            if !strictly_increasing(&severities) {
                continue;
            }

            let evidence: Vec<&ActionRecord> = occurrences.iter().map(|(a, _)| *a).collect();
            let progression: Vec<&str> = severities.iter().map(ViolationSeverity::as_str).collect();
            let description = format!(
                "'{}' violations grew more severe across {} occurrences ({})",
                violation_type,
                occurrences.len(),
                progression.join(" -> ")
            );
            patterns.extend(ScopeCreepPattern::from_evidence(
                PatternType::ConstraintErosion,
                violation_type.as_str(),
                None,
                description,
                &evidence,
                EROSION_SEVERITY,
            ));
        }

        patterns
    }
}
