//! Domain drift: repeated actions outside the allowed domains.

use ledger_chain::{ActionRecord, ConstraintType};

use crate::config::DriftConfig;
use crate::constraints::{action_domain, allowed_tokens, token_allowed};
use crate::drift::{DriftInput, PatternDetector};
use crate::types::{PatternType, ScopeCreepPattern};

/// Reports authorisations with repeated out-of-domain actions.
///
/// There is no ordering requirement: enough out-of-domain actions is a trend
/// on its own.
pub struct DomainDriftDetector {
    min_outside: usize,
}

impl DomainDriftDetector {
    pub fn new(config: &DriftConfig) -> Self {
        Self {
            min_outside: config.domain_drift_min_outside,
        }
    }
}

impl PatternDetector for DomainDriftDetector {
    fn name(&self) -> &str {
        "domain_drift_detector"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::DomainDrift
    }

    fn detect(&self, input: &DriftInput<'_>) -> Vec<ScopeCreepPattern> {
        let mut patterns = Vec::new();

        for (auth_id, actions) in input.actions_by_authorisation() {
            let Some(auth) = input.authorisation(auth_id) else {
                continue;
            };
            let Some(restriction) = auth.constraint(ConstraintType::DomainRestriction) else {
                continue;
            };
            let allowed = allowed_tokens(&restriction.parameter);
            if allowed.is_empty() {
                continue;
            }

            let mut outside: Vec<&ActionRecord> = Vec::new();
            let mut domains: Vec<String> = Vec::new();
            for action in actions {
                let Some(domain) = action_domain(action) else {
                    continue;
                };
                if !token_allowed(&domain, &allowed) {
                    outside.push(action);
                    if !domains.contains(&domain) {
                        domains.push(domain);
                    }
                }
            }

            if outside.len() < self.min_outside {
                continue;
            }

            let description = format!(
                "{} actions under authorisation '{}' fell outside the allowed domains ({}): {}",
                outside.len(),
                auth_id,
                allowed.join(", "),
                domains.join(", ")
            );
            patterns.extend(ScopeCreepPattern::from_evidence(
                PatternType::DomainDrift,
                auth_id,
                Some(auth_id),
                description,
                &outside,
                (0.3 + 0.1 * outside.len() as f64).min(0.9),
            ));
        }

        patterns
    }
}
