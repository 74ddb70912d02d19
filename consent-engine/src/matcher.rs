//! Consent matching.
//!
//! Compares one action to the authorisation it claims. Checks run in a fixed
//! order and the first four short-circuit:
//!
//! 1. authorisation missing → `exceeded`
//! 2. authorisation revoked → `revoked` (checked before expiry)
//! 3. authorisation expired before the action → `expired`
//! 4. emergency scope → `pending_ratification`, constraints not evaluated
//! 5. every constraint evaluated; `within_bounds` only if none is breached

use chrono::{DateTime, Utc};
use tracing::trace;

use ledger_chain::{ActionRecord, AuthorisationEntry, AuthorisationScope};

use crate::constraints::evaluate_constraint;
use crate::types::{
    ConsentMatch, ConsentViolation, MatchContext, MatchStatus, ViolationSeverity, ViolationType,
};

/// Evaluates actions against authorisations. Stateless.
pub struct ConsentMatcher;

impl ConsentMatcher {
    /// Match `action` against `authorisation` (the entry its
    /// `authorisation_id` resolves to, if any).
    pub fn evaluate(
        authorisation: Option<&AuthorisationEntry>,
        action: &ActionRecord,
        context: &MatchContext,
        evaluated_at: DateTime<Utc>,
    ) -> ConsentMatch {
        let (status, violations) = match authorisation {
            None => (
                MatchStatus::Exceeded,
                vec![ConsentViolation::new(
                    ViolationType::Authorisation,
                    "existing authorisation",
                    action.authorisation_id.clone(),
                    ViolationSeverity::Critical,
                    format!(
                        "No authorisation found with id '{}'",
                        action.authorisation_id
                    ),
                )],
            ),
            Some(auth) if auth.revoked => (
                MatchStatus::Revoked,
                vec![ConsentViolation::new(
                    ViolationType::Revocation,
                    "active authorisation",
                    auth.revoked_at
                        .map(|at| format!("revoked at {}", at.to_rfc3339()))
                        .unwrap_or_else(|| "revoked".to_string()),
                    ViolationSeverity::Critical,
                    "Authorisation has been revoked",
                )],
            ),
            Some(auth) if auth.expired_before(action.created_at) => (
                MatchStatus::Expired,
                vec![ConsentViolation::new(
                    ViolationType::Expiry,
                    auth.expires_at
                        .map(|at| format!("before {}", at.to_rfc3339()))
                        .unwrap_or_default(),
                    action.created_at.to_rfc3339(),
                    ViolationSeverity::Critical,
                    "Authorisation had expired when the action was taken",
                )],
            ),
            Some(auth) if auth.scope == AuthorisationScope::Emergency => {
                (MatchStatus::PendingRatification, Vec::new())
            }
            Some(auth) => {
                let violations: Vec<ConsentViolation> = auth
                    .constraints
                    .iter()
                    .filter_map(|c| evaluate_constraint(c, &auth.id, action, context))
                    .collect();
                let status = if violations.is_empty() {
                    MatchStatus::WithinBounds
                } else {
                    MatchStatus::Exceeded
                };
                (status, violations)
            }
        };

        trace!(
            action_id = %action.id,
            authorisation_id = %action.authorisation_id,
            status = %status,
            violations = violations.len(),
            "Evaluated consent"
        );

        ConsentMatch {
            authorisation_id: action.authorisation_id.clone(),
            action_id: action.id.clone(),
            status,
            violations,
            evaluated_at,
        }
    }
}
