//! Scope-creep detection.
//!
//! A single overreach is a consent violation; a *trend* of overreach is scope
//! creep. Each detector mines the full history and reports a pattern only when
//! it has at least [`MIN_DATA_POINTS`](crate::config::MIN_DATA_POINTS) pieces
//! of supporting evidence:
//!
//! - **Gradual expansion**: spend creeping toward the monetary limit
//! - **Frequency escalation**: more actions in each successive period
//! - **Domain drift**: repeated actions outside the allowed domains
//! - **Constraint erosion**: violations of one kind growing more severe
//! - **Authority inflation**: failing actions under authorisations that do not exist

mod domain;
mod erosion;
mod expansion;
mod frequency;
mod inflation;

pub use domain::DomainDriftDetector;
pub use erosion::ConstraintErosionDetector;
pub use expansion::GradualExpansionDetector;
pub use frequency::{period_bucket, FrequencyEscalationDetector};
pub use inflation::AuthorityInflationDetector;

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use ledger_chain::{ActionRecord, AuthorisationEntry};

use crate::config::DriftConfig;
use crate::types::{ConsentViolation, MatchStatus, PatternType, ScopeCreepPattern};

/// Everything the detectors look at.
#[derive(Debug, Clone, Copy)]
pub struct DriftInput<'a> {
    /// Every authorisation, in chain order
    pub authorisations: &'a [AuthorisationEntry],
    /// Every action, in chain order
    pub actions: &'a [ActionRecord],
    /// Violations per action id, from a prior matcher pass
    pub violations: &'a HashMap<String, Vec<ConsentViolation>>,
    /// Match status per action id, from a prior matcher pass
    pub statuses: &'a HashMap<String, MatchStatus>,
}

impl<'a> DriftInput<'a> {
    /// Look up an authorisation by id.
    pub fn authorisation(&self, id: &str) -> Option<&'a AuthorisationEntry> {
        self.authorisations.iter().find(|a| a.id == id)
    }

    /// Actions sorted ascending by timestamp; ties keep chain order.
    pub fn actions_chronological(&self) -> Vec<&'a ActionRecord> {
        let mut actions: Vec<&ActionRecord> = self.actions.iter().collect();
        actions.sort_by_key(|a| a.created_at);
        actions
    }

    /// Actions grouped by the authorisation they claim, each group chronological.
    pub fn actions_by_authorisation(&self) -> BTreeMap<&'a str, Vec<&'a ActionRecord>> {
        let mut groups: BTreeMap<&str, Vec<&ActionRecord>> = BTreeMap::new();
        for action in self.actions_chronological() {
            groups
                .entry(action.authorisation_id.as_str())
                .or_default()
                .push(action);
        }
        groups
    }
}

/// Common trait for scope-creep detectors.
pub trait PatternDetector: Send + Sync {
    /// Name of the detector.
    fn name(&self) -> &str;

    /// Kind of pattern this detector reports.
    fn pattern_type(&self) -> PatternType;

    /// Mine the history for patterns.
    fn detect(&self, input: &DriftInput<'_>) -> Vec<ScopeCreepPattern>;
}

/// Runs every detector and applies the evidence threshold.
pub struct DriftDetector {
    config: DriftConfig,
    detectors: Vec<Box<dyn PatternDetector>>,
}

impl DriftDetector {
    /// Create a detector with default thresholds.
    pub fn new() -> Self {
        Self::with_config(DriftConfig::default())
    }

    /// Create with custom thresholds.
    pub fn with_config(config: DriftConfig) -> Self {
        let detectors: Vec<Box<dyn PatternDetector>> = vec![
            Box::new(GradualExpansionDetector::new(&config)),
            Box::new(FrequencyEscalationDetector::new(&config)),
            Box::new(DomainDriftDetector::new(&config)),
            Box::new(ConstraintErosionDetector::new(&config)),
            Box::new(AuthorityInflationDetector::new(&config)),
        ];
        Self { config, detectors }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Run all detectors over the history.
    ///
    /// Patterns backed by fewer than `min_data_points` evidence entries are
    /// discarded regardless of which detector produced them.
    pub fn detect(&self, input: &DriftInput<'_>) -> Vec<ScopeCreepPattern> {
        let mut patterns = Vec::new();

        for detector in &self.detectors {
            let found = detector.detect(input);
            if !found.is_empty() {
                debug!(
                    detector = detector.name(),
                    pattern_type = %detector.pattern_type(),
                    patterns = found.len(),
                    "Scope creep detected"
                );
            }
            patterns.extend(found);
        }

        let min = self.config.min_data_points;
        patterns.retain(|p| p.evidence.len() >= min);
        patterns
    }
}

impl Default for DriftDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether every consecutive pair strictly increases.
pub(crate) fn strictly_increasing<T: PartialOrd>(values: &[T]) -> bool {
    values.windows(2).all(|pair| pair[0] < pair[1])
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use ledger_chain::{ActionRecord, AuthorisationEntry, AuthorisationScope, ConsentConstraint};
    use serde_json::Value;
    use std::collections::BTreeMap;

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    pub fn authorisation(constraints: Vec<ConsentConstraint>) -> AuthorisationEntry {
        AuthorisationEntry::new(
            "principal-1",
            "agent-1",
            AuthorisationScope::Standing,
            "Household purchases",
            constraints,
            None,
            start() - Duration::days(1),
        )
    }

    pub fn action(auth_id: &str, at: DateTime<Utc>, params: Value) -> ActionRecord {
        let parameters: BTreeMap<String, Value> = params
            .as_object()
            .map(|o| o.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        ActionRecord::new("agent-1", auth_id, "purchase", "Bought something", parameters, None, at)
    }
}
