//! Authority inflation: failing actions under authorisations that do not exist.

use std::collections::HashSet;

use ledger_chain::ActionRecord;

use crate::config::DriftConfig;
use crate::drift::{DriftInput, PatternDetector};
use crate::types::{PatternType, ScopeCreepPattern};

const INFLATION_SEVERITY: f64 = 0.8;

/// Reports an agent repeatedly claiming authority it was never given. Reads
/// match statuses from a prior matcher pass.
pub struct AuthorityInflationDetector {
    min_orphans: usize,
}

impl AuthorityInflationDetector {
    pub fn new(config: &DriftConfig) -> Self {
        Self {
            min_orphans: config.inflation_min_orphans,
        }
    }
}

impl PatternDetector for AuthorityInflationDetector {
    fn name(&self) -> &str {
        "authority_inflation_detector"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::AuthorityInflation
    }

    fn detect(&self, input: &DriftInput<'_>) -> Vec<ScopeCreepPattern> {
        let known: HashSet<&str> = input.authorisations.iter().map(|a| a.id.as_str()).collect();

        let orphans: Vec<&ActionRecord> = input
            .actions_chronological()
            .into_iter()
            .filter(|a| !known.contains(a.authorisation_id.as_str()))
            .filter(|a| input.statuses.get(&a.id).is_some_and(|s| s.is_failure()))
            .collect();

        if orphans.len() < self.min_orphans {
            return Vec::new();
        }

        let mut claimed: Vec<&str> = Vec::new();
        for action in &orphans {
            if !claimed.contains(&action.authorisation_id.as_str()) {
                claimed.push(&action.authorisation_id);
            }
        }

        let description = format!(
            "{} failing actions claimed authorisations that do not exist ({})",
            orphans.len(),
            claimed.join(", ")
        );
        ScopeCreepPattern::from_evidence(
            PatternType::AuthorityInflation,
            "unknown_authorisation",
            None,
            description,
            &orphans,
            INFLATION_SEVERITY,
        )
        .into_iter()
        .collect()
    }
}
