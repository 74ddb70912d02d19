//! Read-only results handed to reporting collaborators.
//!
//! The ledger performs no formatting; these types carry everything a renderer
//! needs.

use serde::{Deserialize, Serialize};

use consent_engine::{ConsentMatch, MatchStatus, ScopeCreepPattern};
use ledger_chain::ChainIntegrity;

use crate::snapshot::LedgerSnapshot;

/// Result of verifying both chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Whether both chains verified
    pub valid: bool,
    /// Elements walked on the authority chain
    pub authorisations_checked: usize,
    /// Elements walked on the action chain
    pub actions_checked: usize,
    /// Authority chain detail
    pub authorisation_chain: ChainIntegrity,
    /// Action chain detail
    pub action_chain: ChainIntegrity,
}

impl IntegrityReport {
    pub fn new(authorisation_chain: ChainIntegrity, action_chain: ChainIntegrity) -> Self {
        Self {
            valid: authorisation_chain.valid && action_chain.valid,
            authorisations_checked: authorisation_chain.checked,
            actions_checked: action_chain.checked,
            authorisation_chain,
            action_chain,
        }
    }
}

/// Statistics over a ledger's current state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentStats {
    /// Grants ever recorded
    pub total_authorisations: usize,
    /// Grants currently active
    pub active_authorisations: usize,
    /// Grants revoked
    pub revoked_authorisations: usize,
    /// Actions recorded
    pub total_actions: usize,
    /// Matches by status
    pub within_bounds: usize,
    pub exceeded: usize,
    pub revoked: usize,
    pub expired: usize,
    pub pending_ratification: usize,
    /// Violations across all matches
    pub total_violations: usize,
    /// Scope-creep patterns currently detected
    pub patterns_detected: usize,
}

impl ConsentStats {
    /// Tally match outcomes.
    pub fn record_matches(&mut self, matches: &[ConsentMatch]) {
        for m in matches {
            match m.status {
                MatchStatus::WithinBounds => self.within_bounds += 1,
                MatchStatus::Exceeded => self.exceeded += 1,
                MatchStatus::Revoked => self.revoked += 1,
                MatchStatus::Expired => self.expired += 1,
                MatchStatus::PendingRatification => self.pending_ratification += 1,
            }
            self.total_violations += m.violations.len();
        }
    }

    /// Share of actions that stayed within what was authorised (1.0 when no actions).
    pub fn compliance_rate(&self) -> f64 {
        if self.total_actions == 0 {
            return 1.0;
        }
        self.within_bounds as f64 / self.total_actions as f64
    }
}

/// Everything a reporting component consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerReport {
    pub snapshot: LedgerSnapshot,
    pub matches: Vec<ConsentMatch>,
    pub patterns: Vec<ScopeCreepPattern>,
    pub integrity: Option<IntegrityReport>,
    pub stats: ConsentStats,
}
