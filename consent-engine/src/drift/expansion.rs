//! Gradual expansion: spend creeping toward the monetary limit.

use ledger_chain::{ActionRecord, ConstraintType};

use crate::config::DriftConfig;
use crate::constraints::{action_amount, parse_number};
use crate::drift::{strictly_increasing, DriftInput, PatternDetector};
use crate::types::{PatternType, ScopeCreepPattern};

/// Reports authorisations whose amount/limit ratio rises at every step and
/// ends close to the limit.
pub struct GradualExpansionDetector {
    min_data_points: usize,
    final_ratio: f64,
}

impl GradualExpansionDetector {
    pub fn new(config: &DriftConfig) -> Self {
        Self {
            min_data_points: config.min_data_points,
            final_ratio: config.expansion_final_ratio,
        }
    }
}

impl PatternDetector for GradualExpansionDetector {
    fn name(&self) -> &str {
        "gradual_expansion_detector"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::GradualExpansion
    }

    fn detect(&self, input: &DriftInput<'_>) -> Vec<ScopeCreepPattern> {
        let mut patterns = Vec::new();

        for (auth_id, actions) in input.actions_by_authorisation() {
            let Some(auth) = input.authorisation(auth_id) else {
                continue;
            };
            let Some(limit) = auth
                .constraint(ConstraintType::MonetaryLimit)
                .and_then(|c| parse_number(&c.parameter))
                .filter(|limit| *limit > 0.0)
            else {
                continue;
            };

            // Actions without a usable amount are dropped, not counted as zero.
            let (evidence, ratios): (Vec<&ActionRecord>, Vec<f64>) = actions
                .iter()
                .filter_map(|a| action_amount(a).map(|amount| (*a, amount / limit)))
                .unzip();

            if ratios.len() < self.min_data_points || !strictly_increasing(&ratios) {
                continue;
            }
            let Some(&last) = ratios.last() else {
                continue;
            };
            if last < self.final_ratio {
                continue;
            }

            let description = format!(
                "Spending under authorisation '{}' rose across {} consecutive actions, reaching {:.0}% of the {} limit",
                auth_id,
                ratios.len(),
                last * 100.0,
                limit
            );
            patterns.extend(ScopeCreepPattern::from_evidence(
                PatternType::GradualExpansion,
                auth_id,
                Some(auth_id),
                description,
                &evidence,
                (0.3 + 0.5 * last).min(0.9),
            ));
        }

        patterns
    }
}
