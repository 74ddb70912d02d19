//! Core record types for the consent ledger.
//!
//! Two chains are built from these records: the authority chain, holding
//! [`AuthorityEvent`]s (grants and revocations), and the action chain, holding
//! [`ActionRecord`]s.
//!
//! With the `typescript` feature enabled, these types can be exported to TypeScript
//! using ts-rs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::chain::Chained;

/// Breadth of a human's grant of permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum AuthorisationScope {
    /// A single, named task
    Specific,
    /// A class of tasks
    Categorical,
    /// Ongoing permission until revoked or expired
    Standing,
    /// Act now, ratify later
    Emergency,
    /// Granted through another agent
    Delegated,
}

impl AuthorisationScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Specific => "specific",
            Self::Categorical => "categorical",
            Self::Standing => "standing",
            Self::Emergency => "emergency",
            Self::Delegated => "delegated",
        }
    }
}

impl fmt::Display for AuthorisationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-checkable boundary kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    /// Parameter is a number; actions may not spend more
    MonetaryLimit,
    /// Parameter is a comma list of allowed domains
    DomainRestriction,
    /// Parameter is `<start>/<end>`
    TimeWindow,
    /// Action must carry an approval flag
    ApprovalRequired,
    /// Parameter is a comma list of allowed recipients
    RecipientRestriction,
    /// Parameter is the maximum number of actions per period
    FrequencyLimit,
    /// Description must appear in the action's description
    Custom,
}

impl ConstraintType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MonetaryLimit => "monetary_limit",
            Self::DomainRestriction => "domain_restriction",
            Self::TimeWindow => "time_window",
            Self::ApprovalRequired => "approval_required",
            Self::RecipientRestriction => "recipient_restriction",
            Self::FrequencyLimit => "frequency_limit",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A boundary attached to an authorisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ConsentConstraint {
    /// Kind of boundary
    pub constraint_type: ConstraintType,
    /// Human-readable description
    pub description: String,
    /// Constraint-specific parameter string
    pub parameter: String,
}

impl ConsentConstraint {
    pub fn new(
        constraint_type: ConstraintType,
        description: impl Into<String>,
        parameter: impl Into<String>,
    ) -> Self {
        Self {
            constraint_type,
            description: description.into(),
            parameter: parameter.into(),
        }
    }

    /// Spend no more than `limit` per action.
    pub fn monetary_limit(limit: f64) -> Self {
        Self::new(
            ConstraintType::MonetaryLimit,
            format!("Spend at most {}", limit),
            limit.to_string(),
        )
    }

    /// Stay within the listed domains.
    pub fn domain_restriction(allowed: &[&str]) -> Self {
        Self::new(
            ConstraintType::DomainRestriction,
            format!("Only act within: {}", allowed.join(", ")),
            allowed.join(","),
        )
    }

    /// Act only between `start` and `end`.
    pub fn time_window(start: &str, end: &str) -> Self {
        Self::new(
            ConstraintType::TimeWindow,
            format!("Only act between {} and {}", start, end),
            format!("{}/{}", start, end),
        )
    }

    /// Every action needs explicit human approval.
    pub fn approval_required() -> Self {
        Self::new(
            ConstraintType::ApprovalRequired,
            "Human approval required before acting",
            "true",
        )
    }

    /// Pay or contact only the listed recipients.
    pub fn recipient_restriction(allowed: &[&str]) -> Self {
        Self::new(
            ConstraintType::RecipientRestriction,
            format!("Only transact with: {}", allowed.join(", ")),
            allowed.join(","),
        )
    }

    /// At most `limit` actions per period.
    pub fn frequency_limit(limit: u64) -> Self {
        Self::new(
            ConstraintType::FrequencyLimit,
            format!("At most {} actions per period", limit),
            limit.to_string(),
        )
    }

    /// Free-form requirement matched against action descriptions.
    pub fn custom(description: impl Into<String>) -> Self {
        Self::new(ConstraintType::Custom, description, "")
    }
}

/// A human's grant of permission to an agent.
///
/// `revoked` and `revoked_at` are derived from [`RevocationRecord`]s on the
/// authority chain and are not part of the grant's hashed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AuthorisationEntry {
    /// Unique identifier
    pub id: String,
    /// When the grant was recorded
    pub created_at: DateTime<Utc>,
    /// Human granting permission
    pub principal_id: String,
    /// Agent receiving permission
    pub agent_id: String,
    /// Breadth of the grant
    pub scope: AuthorisationScope,
    /// What was authorised, in the principal's words
    pub description: String,
    /// Boundaries, in the order they were given
    pub constraints: Vec<ConsentConstraint>,
    /// Optional expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the grant has been revoked
    #[serde(default)]
    pub revoked: bool,
    /// When it was revoked
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    /// Own chain digest
    pub hash: String,
    /// Preceding element's chain digest
    pub previous_hash: String,
}

impl AuthorisationEntry {
    /// Create an unsealed grant.
    pub fn new(
        principal_id: impl Into<String>,
        agent_id: impl Into<String>,
        scope: AuthorisationScope,
        description: impl Into<String>,
        constraints: Vec<ConsentConstraint>,
        expires_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at,
            principal_id: principal_id.into(),
            agent_id: agent_id.into(),
            scope,
            description: description.into(),
            constraints,
            expires_at,
            revoked: false,
            revoked_at: None,
            hash: String::new(),
            previous_hash: String::new(),
        }
    }

    /// First constraint of the given type.
    pub fn constraint(&self, constraint_type: ConstraintType) -> Option<&ConsentConstraint> {
        self.constraints
            .iter()
            .find(|c| c.constraint_type == constraint_type)
    }

    /// Whether the grant has an expiry strictly before `at`.
    pub fn expired_before(&self, at: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry < at)
    }

    /// Not revoked, and either no expiry or an expiry strictly after `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at.map_or(true, |expiry| expiry > now)
    }
}

#[derive(Serialize)]
struct GrantPayload<'a> {
    event: &'static str,
    id: &'a str,
    created_at: &'a DateTime<Utc>,
    principal_id: &'a str,
    agent_id: &'a str,
    scope: AuthorisationScope,
    description: &'a str,
    constraints: &'a [ConsentConstraint],
    expires_at: &'a Option<DateTime<Utc>>,
}

impl Chained for AuthorisationEntry {
    fn chain_id(&self) -> &str {
        &self.id
    }

    fn hash(&self) -> &str {
        &self.hash
    }

    fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    fn canonical_payload(&self) -> String {
        let payload = GrantPayload {
            event: "granted",
            id: &self.id,
            created_at: &self.created_at,
            principal_id: &self.principal_id,
            agent_id: &self.agent_id,
            scope: self.scope,
            description: &self.description,
            constraints: &self.constraints,
            expires_at: &self.expires_at,
        };
        serde_json::to_string(&payload).unwrap_or_default()
    }

    fn set_links(&mut self, previous_hash: String, hash: String) {
        self.previous_hash = previous_hash;
        self.hash = hash;
    }
}

/// Withdrawal of a grant, appended to the authority chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct RevocationRecord {
    /// Unique identifier
    pub id: String,
    /// Grant being withdrawn
    pub authorisation_id: String,
    /// When it was withdrawn
    pub revoked_at: DateTime<Utc>,
    /// Optional reason given by the principal
    pub reason: Option<String>,
    /// Own chain digest
    pub hash: String,
    /// Preceding element's chain digest
    pub previous_hash: String,
}

impl RevocationRecord {
    /// Create an unsealed revocation.
    pub fn new(
        authorisation_id: impl Into<String>,
        revoked_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            authorisation_id: authorisation_id.into(),
            revoked_at,
            reason,
            hash: String::new(),
            previous_hash: String::new(),
        }
    }
}

#[derive(Serialize)]
struct RevocationPayload<'a> {
    event: &'static str,
    id: &'a str,
    authorisation_id: &'a str,
    revoked_at: &'a DateTime<Utc>,
    reason: &'a Option<String>,
}

impl Chained for RevocationRecord {
    fn chain_id(&self) -> &str {
        &self.id
    }

    fn hash(&self) -> &str {
        &self.hash
    }

    fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    fn canonical_payload(&self) -> String {
        let payload = RevocationPayload {
            event: "revoked",
            id: &self.id,
            authorisation_id: &self.authorisation_id,
            revoked_at: &self.revoked_at,
            reason: &self.reason,
        };
        serde_json::to_string(&payload).unwrap_or_default()
    }

    fn set_links(&mut self, previous_hash: String, hash: String) {
        self.previous_hash = previous_hash;
        self.hash = hash;
    }
}

/// One element of the authority chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthorityEvent {
    Granted(AuthorisationEntry),
    Revoked(RevocationRecord),
}

impl AuthorityEvent {
    fn inner(&self) -> &dyn Chained {
        match self {
            Self::Granted(entry) => entry as &dyn Chained,
            Self::Revoked(record) => record as &dyn Chained,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Chained {
        match self {
            Self::Granted(entry) => entry as &mut dyn Chained,
            Self::Revoked(record) => record as &mut dyn Chained,
        }
    }
}

impl Chained for AuthorityEvent {
    fn chain_id(&self) -> &str {
        self.inner().chain_id()
    }

    fn hash(&self) -> &str {
        self.inner().hash()
    }

    fn previous_hash(&self) -> &str {
        self.inner().previous_hash()
    }

    fn canonical_payload(&self) -> String {
        self.inner().canonical_payload()
    }

    fn set_links(&mut self, previous_hash: String, hash: String) {
        self.inner_mut().set_links(previous_hash, hash);
    }
}

/// Something the agent did, claiming a specific authorisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ActionRecord {
    /// Unique identifier
    pub id: String,
    /// When the action was recorded
    pub created_at: DateTime<Utc>,
    /// Agent that acted
    pub agent_id: String,
    /// Authorisation the agent claims to act under (may not exist)
    pub authorisation_id: String,
    /// Action-type tag, e.g. `payment`
    pub action_type: String,
    /// What was done
    pub description: String,
    /// Open parameter map; sorted keys keep the payload deterministic
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Opaque reference into an external decision trace
    pub trace_ref: Option<String>,
    /// Own chain digest
    pub hash: String,
    /// Preceding element's chain digest
    pub previous_hash: String,
}

impl ActionRecord {
    /// Create an unsealed action.
    pub fn new(
        agent_id: impl Into<String>,
        authorisation_id: impl Into<String>,
        action_type: impl Into<String>,
        description: impl Into<String>,
        parameters: BTreeMap<String, serde_json::Value>,
        trace_ref: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at,
            agent_id: agent_id.into(),
            authorisation_id: authorisation_id.into(),
            action_type: action_type.into(),
            description: description.into(),
            parameters,
            trace_ref,
            hash: String::new(),
            previous_hash: String::new(),
        }
    }

    /// Look up a single parameter.
    pub fn parameter(&self, key: &str) -> Option<&serde_json::Value> {
        self.parameters.get(key)
    }

    /// First of `keys` for which `extract` yields a value.
    pub fn lookup<'a, T>(
        &'a self,
        keys: &[&str],
        extract: impl Fn(&'a serde_json::Value) -> Option<T>,
    ) -> Option<T> {
        keys.iter()
            .filter_map(|key| self.parameters.get(*key))
            .find_map(extract)
    }
}

#[derive(Serialize)]
struct ActionPayload<'a> {
    id: &'a str,
    created_at: &'a DateTime<Utc>,
    agent_id: &'a str,
    authorisation_id: &'a str,
    action_type: &'a str,
    description: &'a str,
    parameters: &'a BTreeMap<String, serde_json::Value>,
    trace_ref: &'a Option<String>,
}

impl Chained for ActionRecord {
    fn chain_id(&self) -> &str {
        &self.id
    }

    fn hash(&self) -> &str {
        &self.hash
    }

    fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    fn canonical_payload(&self) -> String {
        let payload = ActionPayload {
            id: &self.id,
            created_at: &self.created_at,
            agent_id: &self.agent_id,
            authorisation_id: &self.authorisation_id,
            action_type: &self.action_type,
            description: &self.description,
            parameters: &self.parameters,
            trace_ref: &self.trace_ref,
        };
        serde_json::to_string(&payload).unwrap_or_default()
    }

    fn set_links(&mut self, previous_hash: String, hash: String) {
        self.previous_hash = previous_hash;
        self.hash = hash;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::GENESIS_HASH;
    use serde_json::json;

    fn grant() -> AuthorisationEntry {
        AuthorisationEntry::new(
            "principal-1",
            "agent-1",
            AuthorisationScope::Standing,
            "Pay utility bills",
            vec![ConsentConstraint::monetary_limit(500.0)],
            None,
            Utc::now(),
        )
    }

    #[test]
    fn test_constraint_constructors() {
        let c = ConsentConstraint::domain_restriction(&["utilities", "groceries"]);
        assert_eq!(c.constraint_type, ConstraintType::DomainRestriction);
        assert_eq!(c.parameter, "utilities,groceries");

        let c = ConsentConstraint::time_window("2026-01-01", "2026-02-01");
        assert_eq!(c.parameter, "2026-01-01/2026-02-01");

        assert_eq!(ConsentConstraint::monetary_limit(500.0).parameter, "500");
    }

    #[test]
    fn test_revocation_state_not_hashed() {
        let mut entry = grant();
        entry.seal(GENESIS_HASH);
        let before = entry.hash.clone();

        entry.revoked = true;
        entry.revoked_at = Some(Utc::now());

        assert_eq!(entry.compute_hash(), before);
        assert!(entry.is_sealed());
    }

    #[test]
    fn test_grant_content_is_hashed() {
        let mut entry = grant();
        entry.seal(GENESIS_HASH);
        entry.description = "Pay any bill".to_string();
        assert!(!entry.is_sealed());
    }

    #[test]
    fn test_action_payload_ignores_insertion_order() {
        let now = Utc::now();
        let mut a = BTreeMap::new();
        a.insert("amount".to_string(), json!(320));
        a.insert("payee".to_string(), json!("Power Co"));
        let mut b = BTreeMap::new();
        b.insert("payee".to_string(), json!("Power Co"));
        b.insert("amount".to_string(), json!(320));

        let mut first =
            ActionRecord::new("agent-1", "auth-1", "payment", "Paid bill", a, None, now);
        let mut second = first.clone();
        second.parameters = b;

        first.seal(GENESIS_HASH);
        second.seal(GENESIS_HASH);
        assert_eq!(first.hash, second.hash);
    }

    #[test]
    fn test_action_lookup_falls_back() {
        let mut params = BTreeMap::new();
        params.insert("amount".to_string(), json!("not a number"));
        params.insert("cost".to_string(), json!(42.5));
        let action =
            ActionRecord::new("agent-1", "auth-1", "payment", "", params, None, Utc::now());

        let value = action.lookup(&["amount", "value", "cost"], |v| v.as_f64());
        assert_eq!(value, Some(42.5));
        assert_eq!(action.lookup(&["missing"], |v| v.as_f64()), None);
    }

    #[test]
    fn test_authority_event_serde_tag() {
        let mut entry = grant();
        entry.seal(GENESIS_HASH);
        let event = AuthorityEvent::Granted(entry);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "granted");

        let parsed: AuthorityEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
        assert!(parsed.is_sealed());
    }

    #[test]
    fn test_is_active_at() {
        let now = Utc::now();
        let mut entry = grant();
        assert!(entry.is_active_at(now));

        entry.expires_at = Some(now);
        assert!(!entry.is_active_at(now));
        assert!(!entry.expired_before(now));

        entry.expires_at = Some(now + chrono::Duration::hours(1));
        assert!(entry.is_active_at(now));

        entry.revoked = true;
        assert!(!entry.is_active_at(now));
    }
}
