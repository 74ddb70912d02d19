//! Consent ledger facade.
//!
//! Composes the store, matcher and drift detector behind one API. Mutations
//! take effect immediately; every read derivation (matches, patterns, integrity)
//! is recomputed from the chains on each call.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use consent_engine::{
    period_bucket, ConsentMatch, ConsentMatcher, DriftDetector, DriftInput, MatchContext,
    ScopeCreepPattern,
};
use ledger_chain::{
    verify_chain, ActionRecord, AuthorisationEntry, AuthorisationScope, AuthorityEvent,
    ConsentConstraint, RevocationRecord,
};

use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::report::{ConsentStats, IntegrityReport, LedgerReport};
use crate::snapshot::{LedgerSnapshot, SNAPSHOT_SCHEMA};
use crate::store::LedgerStore;

/// Request to grant an agent permission.
#[derive(Debug, Clone)]
pub struct NewAuthorisation {
    pub agent_id: String,
    pub scope: AuthorisationScope,
    pub description: String,
    pub constraints: Vec<ConsentConstraint>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewAuthorisation {
    pub fn new(
        agent_id: impl Into<String>,
        scope: AuthorisationScope,
        description: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            scope,
            description: description.into(),
            constraints: Vec::new(),
            expires_at: None,
        }
    }

    /// Append a constraint. Order is preserved.
    pub fn with_constraint(mut self, constraint: ConsentConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

/// Request to record something an agent did.
#[derive(Debug, Clone)]
pub struct NewAction {
    pub agent_id: String,
    pub authorisation_id: String,
    pub action_type: String,
    pub description: String,
    pub parameters: BTreeMap<String, Value>,
    pub trace_ref: Option<String>,
}

impl NewAction {
    pub fn new(
        agent_id: impl Into<String>,
        authorisation_id: impl Into<String>,
        action_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            authorisation_id: authorisation_id.into(),
            action_type: action_type.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
            trace_ref: None,
        }
    }

    /// Set a parameter. Values that cannot be represented as JSON become `null`.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.parameters
            .insert(key.into(), serde_json::to_value(value).unwrap_or_default());
        self
    }

    /// Attach an opaque reference to an external decision trace.
    pub fn with_trace_ref(mut self, trace_ref: impl Into<String>) -> Self {
        self.trace_ref = Some(trace_ref.into());
        self
    }
}

/// One principal's consent ledger.
pub struct ConsentLedger {
    principal_id: String,
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
    store: LedgerStore,
}

impl ConsentLedger {
    /// Create an empty ledger using the system clock and default config.
    pub fn new(principal_id: impl Into<String>) -> Self {
        Self {
            principal_id: principal_id.into(),
            config: LedgerConfig::default(),
            clock: Arc::new(SystemClock),
            store: LedgerStore::new(),
        }
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use another time source for new records and evaluations.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Record a grant of permission.
    pub fn authorise(&mut self, request: NewAuthorisation) -> AuthorisationEntry {
        let entry = AuthorisationEntry::new(
            self.principal_id.clone(),
            request.agent_id,
            request.scope,
            request.description,
            request.constraints,
            request.expires_at,
            self.clock.now(),
        );

        let entry = self.store.append_authorisation(entry).clone();
        info!(
            authorisation_id = %entry.id,
            agent_id = %entry.agent_id,
            scope = %entry.scope,
            constraints = entry.constraints.len(),
            "Authorised agent"
        );
        entry
    }

    /// Revoke a grant. Revoking twice is a no-op.
    pub fn revoke(&mut self, authorisation_id: &str) -> Result<AuthorisationEntry> {
        self.revoke_inner(authorisation_id, None)
    }

    /// Revoke a grant, recording why.
    pub fn revoke_with_reason(
        &mut self,
        authorisation_id: &str,
        reason: impl Into<String>,
    ) -> Result<AuthorisationEntry> {
        self.revoke_inner(authorisation_id, Some(reason.into()))
    }

    fn revoke_inner(
        &mut self,
        authorisation_id: &str,
        reason: Option<String>,
    ) -> Result<AuthorisationEntry> {
        let existing = self
            .store
            .authorisation(authorisation_id)
            .ok_or_else(|| LedgerError::authorisation_not_found(authorisation_id))?;
        if existing.revoked {
            debug!(authorisation_id = %authorisation_id, "Already revoked");
            return Ok(existing.clone());
        }

        let record = RevocationRecord::new(authorisation_id, self.clock.now(), reason);
        let entry = self
            .store
            .append_revocation(record)
            .cloned()
            .ok_or_else(|| LedgerError::authorisation_not_found(authorisation_id))?;

        info!(authorisation_id = %entry.id, "Revoked authorisation");
        Ok(entry)
    }

    /// Record an action.
    ///
    /// Any authorisation id is accepted; an unknown one surfaces later as a
    /// matcher violation.
    pub fn record_action(&mut self, request: NewAction) -> ActionRecord {
        if self.store.authorisation(&request.authorisation_id).is_none() {
            debug!(
                authorisation_id = %request.authorisation_id,
                "Recording action under unknown authorisation"
            );
        }

        let action = ActionRecord::new(
            request.agent_id,
            request.authorisation_id,
            request.action_type,
            request.description,
            request.parameters,
            request.trace_ref,
            self.clock.now(),
        );

        let action = self.store.append_action(action).clone();
        debug!(
            action_id = %action.id,
            authorisation_id = %action.authorisation_id,
            action_type = %action.action_type,
            "Recorded action"
        );
        action
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn get_authorisation(&self, id: &str) -> Result<&AuthorisationEntry> {
        self.store
            .authorisation(id)
            .ok_or_else(|| LedgerError::authorisation_not_found(id))
    }

    pub fn get_action(&self, id: &str) -> Result<&ActionRecord> {
        self.store
            .action(id)
            .ok_or_else(|| LedgerError::action_not_found(id))
    }

    /// Current state of every grant, in grant order.
    pub fn authorisations(&self) -> &[AuthorisationEntry] {
        self.store.authorisations()
    }

    /// Every action, in recording order.
    pub fn actions(&self) -> &[ActionRecord] {
        self.store.action_chain()
    }

    /// Grants and revocations as stored on the authority chain.
    pub fn authority_events(&self) -> &[AuthorityEvent] {
        self.store.authority_chain()
    }

    /// Actions claiming the given authorisation, in recording order.
    pub fn actions_for(&self, authorisation_id: &str) -> Vec<&ActionRecord> {
        self.actions()
            .iter()
            .filter(|a| a.authorisation_id == authorisation_id)
            .collect()
    }

    /// Grants neither revoked nor expired as of now.
    pub fn active_authorisations(&self) -> Vec<&AuthorisationEntry> {
        let now = self.clock.now();
        self.authorisations()
            .iter()
            .filter(|a| a.is_active_at(now))
            .collect()
    }

    // ========================================================================
    // Derivations
    // ========================================================================

    /// Match one action against the authorisation it claims.
    pub fn check_consent(&self, action_id: &str) -> Result<ConsentMatch> {
        let position = self
            .store
            .action_position(action_id)
            .ok_or_else(|| LedgerError::action_not_found(action_id))?;
        Ok(self.evaluate_at(position, self.clock.now()))
    }

    /// Match every action, in recording order.
    pub fn check_all_actions(&self) -> Vec<ConsentMatch> {
        let now = self.clock.now();
        (0..self.actions().len())
            .map(|position| self.evaluate_at(position, now))
            .collect()
    }

    fn evaluate_at(&self, position: usize, evaluated_at: DateTime<Utc>) -> ConsentMatch {
        let actions = self.actions();
        let action = &actions[position];
        let context = self.frequency_context(action, &actions[..=position]);
        ConsentMatcher::evaluate(
            self.store.authorisation(&action.authorisation_id),
            action,
            &context,
            evaluated_at,
        )
    }

    /// Count actions under the same authorisation in the action's period, up to
    /// and including the action itself.
    fn frequency_context(&self, action: &ActionRecord, recorded: &[ActionRecord]) -> MatchContext {
        let window = self.config.window_secs();
        let bucket = period_bucket(action.created_at, window);
        let count = recorded
            .iter()
            .filter(|a| {
                a.authorisation_id == action.authorisation_id
                    && period_bucket(a.created_at, window) == bucket
            })
            .count() as u64;
        MatchContext::new().with_count(action.authorisation_id.clone(), count)
    }

    /// Mine the full history for scope creep.
    pub fn detect_scope_creep(&self) -> Vec<ScopeCreepPattern> {
        self.detect_with_matches(&self.check_all_actions())
    }

    fn detect_with_matches(&self, matches: &[ConsentMatch]) -> Vec<ScopeCreepPattern> {
        let violations: HashMap<String, Vec<_>> = matches
            .iter()
            .map(|m| (m.action_id.clone(), m.violations.clone()))
            .collect();
        let statuses: HashMap<String, _> = matches
            .iter()
            .map(|m| (m.action_id.clone(), m.status))
            .collect();

        let input = DriftInput {
            authorisations: self.authorisations(),
            actions: self.actions(),
            violations: &violations,
            statuses: &statuses,
        };
        DriftDetector::with_config(self.config.drift.clone()).detect(&input)
    }

    /// Walk both chains. Never fails; an empty ledger is valid.
    pub fn verify(&self) -> IntegrityReport {
        let report = IntegrityReport::new(
            verify_chain(self.store.authority_chain()),
            verify_chain(self.store.action_chain()),
        );

        if !report.valid && self.config.warn_on_integrity_failure {
            warn!(
                principal_id = %self.principal_id,
                authorisation_break = ?report.authorisation_chain.first_break,
                action_break = ?report.action_chain.first_break,
                "Ledger integrity check failed"
            );
        }
        report
    }

    // ========================================================================
    // Snapshots and reports
    // ========================================================================

    pub fn export(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            schema: SNAPSHOT_SCHEMA.to_string(),
            principal_id: self.principal_id.clone(),
            exported_at: self.clock.now(),
            authority_chain: self.store.authority_chain().to_vec(),
            action_chain: self.store.action_chain().to_vec(),
        }
    }

    /// Rebuild a ledger from a snapshot.
    ///
    /// Chains are loaded as-is; call [`verify`](Self::verify) to check them.
    pub fn import(snapshot: LedgerSnapshot) -> Result<Self> {
        snapshot.check_schema()?;

        info!(
            principal_id = %snapshot.principal_id,
            authority_events = snapshot.authority_chain.len(),
            actions = snapshot.action_chain.len(),
            "Imported ledger snapshot"
        );

        Ok(Self::new(snapshot.principal_id)
            .with_store(LedgerStore::from_chains(snapshot.authority_chain, snapshot.action_chain)))
    }

    fn with_store(mut self, store: LedgerStore) -> Self {
        self.store = store;
        self
    }

    pub fn stats(&self) -> ConsentStats {
        let matches = self.check_all_actions();
        let patterns = self.detect_with_matches(&matches);
        self.stats_for(&matches, &patterns)
    }

    fn stats_for(&self, matches: &[ConsentMatch], patterns: &[ScopeCreepPattern]) -> ConsentStats {
        let now = self.clock.now();
        let mut stats = ConsentStats {
            total_authorisations: self.authorisations().len(),
            active_authorisations: self
                .authorisations()
                .iter()
                .filter(|a| a.is_active_at(now))
                .count(),
            revoked_authorisations: self.authorisations().iter().filter(|a| a.revoked).count(),
            total_actions: self.actions().len(),
            patterns_detected: patterns.len(),
            ..Default::default()
        };
        stats.record_matches(matches);
        stats
    }

    /// Everything a reporting collaborator needs, computed in one pass.
    pub fn report(&self, include_integrity: bool) -> LedgerReport {
        let matches = self.check_all_actions();
        let patterns = self.detect_with_matches(&matches);
        let stats = self.stats_for(&matches, &patterns);

        LedgerReport {
            snapshot: self.export(),
            matches,
            patterns,
            integrity: include_integrity.then(|| self.verify()),
            stats,
        }
    }
}
