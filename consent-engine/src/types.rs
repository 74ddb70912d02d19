//! Verdict and pattern types produced by the engine.
//!
//! Nothing here is stored by the ledger; matches and patterns are recomputed
//! from the chains whenever they are requested.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use ledger_chain::{ActionRecord, ConstraintType};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Outcome of matching one action against its claimed authorisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Missing authorisation or at least one constraint breached
    Exceeded,
    /// Every constraint satisfied
    WithinBounds,
    /// The authorisation was revoked
    Revoked,
    /// The authorisation expired before the action
    Expired,
    /// Emergency scope; awaiting human ratification
    PendingRatification,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exceeded => "exceeded",
            Self::WithinBounds => "within_bounds",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::PendingRatification => "pending_ratification",
        }
    }

    /// Whether the action fell outside what was authorised.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Exceeded | Self::Revoked | Self::Expired)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How serious a violation is. Ordered `Minor < Major < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Minor,
    Major,
    Critical,
}

impl ViolationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }
}

/// What a violation was raised against: a constraint, or one of the
/// short-circuit checks that run before constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    MonetaryLimit,
    DomainRestriction,
    TimeWindow,
    ApprovalRequired,
    RecipientRestriction,
    FrequencyLimit,
    Custom,
    /// No authorisation exists for the claimed id
    Authorisation,
    /// The authorisation was revoked
    Revocation,
    /// The authorisation had expired
    Expiry,
}

impl ViolationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MonetaryLimit => "monetary_limit",
            Self::DomainRestriction => "domain_restriction",
            Self::TimeWindow => "time_window",
            Self::ApprovalRequired => "approval_required",
            Self::RecipientRestriction => "recipient_restriction",
            Self::FrequencyLimit => "frequency_limit",
            Self::Custom => "custom",
            Self::Authorisation => "authorisation",
            Self::Revocation => "revocation",
            Self::Expiry => "expiry",
        }
    }
}

impl From<ConstraintType> for ViolationType {
    fn from(constraint_type: ConstraintType) -> Self {
        match constraint_type {
            ConstraintType::MonetaryLimit => Self::MonetaryLimit,
            ConstraintType::DomainRestriction => Self::DomainRestriction,
            ConstraintType::TimeWindow => Self::TimeWindow,
            ConstraintType::ApprovalRequired => Self::ApprovalRequired,
            ConstraintType::RecipientRestriction => Self::RecipientRestriction,
            ConstraintType::FrequencyLimit => Self::FrequencyLimit,
            ConstraintType::Custom => Self::Custom,
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A specific breach found while matching an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ConsentViolation {
    /// Constraint (or short-circuit check) that was breached
    pub constraint_type: ViolationType,
    /// What the authorisation allowed, for display
    pub expected: String,
    /// What the action did, for display
    pub actual: String,
    /// How serious the breach is
    pub severity: ViolationSeverity,
    /// Human-readable explanation
    pub description: String,
}

impl ConsentViolation {
    pub fn new(
        constraint_type: impl Into<ViolationType>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        severity: ViolationSeverity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            constraint_type: constraint_type.into(),
            expected: expected.into(),
            actual: actual.into(),
            severity,
            description: description.into(),
        }
    }
}

/// Verdict of comparing one action to its claimed authorisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ConsentMatch {
    /// Authorisation the action claimed
    pub authorisation_id: String,
    /// Action evaluated
    pub action_id: String,
    /// Overall verdict
    pub status: MatchStatus,
    /// Breaches, in evaluation order
    pub violations: Vec<ConsentViolation>,
    /// When the verdict was computed
    pub evaluated_at: DateTime<Utc>,
}

impl ConsentMatch {
    /// Highest severity among the violations, if any.
    pub fn worst_severity(&self) -> Option<ViolationSeverity> {
        self.violations.iter().map(|v| v.severity).max()
    }
}

/// Caller-supplied facts the matcher cannot derive from a single action.
#[derive(Debug, Clone, Default)]
pub struct MatchContext {
    /// Actions per authorisation in the current period
    pub action_counts: HashMap<String, u64>,
    /// Per-authorisation overrides of the `frequency_limit` parameter
    pub frequency_limits: HashMap<String, u64>,
}

impl MatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current-period action count for an authorisation.
    pub fn with_count(mut self, authorisation_id: impl Into<String>, count: u64) -> Self {
        self.action_counts.insert(authorisation_id.into(), count);
        self
    }

    /// Override the frequency limit for an authorisation.
    pub fn with_frequency_limit(mut self, authorisation_id: impl Into<String>, limit: u64) -> Self {
        self.frequency_limits.insert(authorisation_id.into(), limit);
        self
    }
}

/// Kinds of slow-moving overreach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Spend creeping up toward the monetary limit
    GradualExpansion,
    /// More actions each period
    FrequencyEscalation,
    /// Repeated actions outside the allowed domains
    DomainDrift,
    /// Violations of one kind growing more severe
    ConstraintErosion,
    /// Repeated failing actions under authorisations that do not exist
    AuthorityInflation,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GradualExpansion => "gradual_expansion",
            Self::FrequencyEscalation => "frequency_escalation",
            Self::DomainDrift => "domain_drift",
            Self::ConstraintErosion => "constraint_erosion",
            Self::AuthorityInflation => "authority_inflation",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A multi-data-point trend indicating gradual overreach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ScopeCreepPattern {
    /// Stable identifier: `<pattern_type>:<group>`
    pub id: String,
    /// Kind of trend
    pub pattern_type: PatternType,
    /// Human-readable summary
    pub description: String,
    /// Supporting action ids, oldest first
    pub evidence: Vec<String>,
    /// Authorisation the trend concerns, when it concerns exactly one
    pub authorisation_id: Option<String>,
    /// Severity score (0.0 - 1.0)
    pub severity: f64,
    /// Timestamp of the earliest supporting action
    pub first_detected: DateTime<Utc>,
    /// Number of supporting data points
    pub occurrence_count: usize,
}

impl ScopeCreepPattern {
    /// Build a pattern from its supporting actions.
    ///
    /// Returns `None` when there is no evidence.
    pub fn from_evidence(
        pattern_type: PatternType,
        group: &str,
        authorisation_id: Option<&str>,
        description: String,
        evidence: &[&ActionRecord],
        severity: f64,
    ) -> Option<Self> {
        let first_detected = evidence.iter().map(|a| a.created_at).min()?;

        let mut ids: Vec<String> = Vec::with_capacity(evidence.len());
        for action in evidence {
            if !ids.contains(&action.id) {
                ids.push(action.id.clone());
            }
        }

        Some(Self {
            id: format!("{}:{}", pattern_type.as_str(), group),
            pattern_type,
            description,
            occurrence_count: ids.len(),
            evidence: ids,
            authorisation_id: authorisation_id.map(str::to_string),
            severity: severity.clamp(0.0, 1.0),
            first_detected,
        })
    }
}
