//! Chain storage and ID indexes.
//!
//! The store owns both chains and is the only place elements are linked and
//! sealed. Authorisation state (including revocation) is materialized from the
//! authority chain as events are appended, so lookups never rescan history.

use std::collections::HashMap;

use ledger_chain::{
    tail_hash, ActionRecord, AuthorisationEntry, AuthorityEvent, Chained, RevocationRecord,
};

/// Two independent append-only chains plus their indexes.
#[derive(Debug, Clone, Default)]
pub struct LedgerStore {
    /// Grants and revocations, in append order
    authority_chain: Vec<AuthorityEvent>,
    /// Actions, in append order
    action_chain: Vec<ActionRecord>,
    /// Current state of every grant, in grant order
    authorisations: Vec<AuthorisationEntry>,
    /// Position in `authority_chain` of each grant in `authorisations`
    grant_events: Vec<usize>,
    /// Authorisation id -> position in `authorisations`
    authorisation_index: HashMap<String, usize>,
    /// Action id -> position in `action_chain`
    action_index: HashMap<String, usize>,
}

impl LedgerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously exported chains.
    ///
    /// Elements are taken as-is apart from revocation state on grants, which is
    /// recomputed from the revocation events. Nothing is re-sealed or verified.
    pub fn from_chains(
        authority_chain: Vec<AuthorityEvent>,
        action_chain: Vec<ActionRecord>,
    ) -> Self {
        let mut store = Self::new();
        for event in authority_chain {
            store.push_event(event);
        }
        store.action_index = action_chain
            .iter()
            .enumerate()
            .map(|(position, action)| (action.id.clone(), position))
            .collect();
        store.action_chain = action_chain;
        store
    }

    /// Link, seal and append a grant.
    pub fn append_authorisation(&mut self, mut entry: AuthorisationEntry) -> &AuthorisationEntry {
        entry.seal(tail_hash(&self.authority_chain));
        let position = self.materialize_grant(&entry);
        self.authority_chain.push(AuthorityEvent::Granted(entry));
        &self.authorisations[position]
    }

    /// Link, seal and append a revocation, then apply it.
    ///
    /// Returns `None` if the revocation names an unknown authorisation; the
    /// event is still appended.
    pub fn append_revocation(
        &mut self,
        mut record: RevocationRecord,
    ) -> Option<&AuthorisationEntry> {
        record.seal(tail_hash(&self.authority_chain));
        let position = self.push_event(AuthorityEvent::Revoked(record))?;
        Some(&self.authorisations[position])
    }

    /// Link, seal and append an action.
    pub fn append_action(&mut self, mut action: ActionRecord) -> &ActionRecord {
        action.seal(tail_hash(&self.action_chain));
        let position = self.action_chain.len();
        self.action_index.insert(action.id.clone(), position);
        self.action_chain.push(action);
        &self.action_chain[position]
    }

    /// Append an event and apply it. Returns the position of the affected grant.
    fn push_event(&mut self, mut event: AuthorityEvent) -> Option<usize> {
        let position = match &mut event {
            AuthorityEvent::Granted(entry) => {
                // Revocation state on a stored grant is ignored; only events count.
                entry.revoked = false;
                entry.revoked_at = None;
                Some(self.materialize_grant(entry))
            }
            AuthorityEvent::Revoked(record) => self.materialize_revocation(record),
        };
        self.authority_chain.push(event);
        position
    }

    fn materialize_grant(&mut self, entry: &AuthorisationEntry) -> usize {
        let position = self.authorisations.len();
        self.authorisation_index.insert(entry.id.clone(), position);
        self.grant_events.push(self.authority_chain.len());
        self.authorisations.push(entry.clone());
        position
    }

    /// Mark a grant revoked, both in the materialized state and on its chain
    /// copy. The chain copy's flags sit outside the hashed payload.
    fn materialize_revocation(&mut self, record: &RevocationRecord) -> Option<usize> {
        let position = *self.authorisation_index.get(&record.authorisation_id)?;
        let entry = &mut self.authorisations[position];
        if entry.revoked {
            return Some(position);
        }
        entry.revoked = true;
        entry.revoked_at = Some(record.revoked_at);

        let event = self.grant_events[position];
        if let Some(AuthorityEvent::Granted(granted)) = self.authority_chain.get_mut(event) {
            granted.revoked = true;
            granted.revoked_at = Some(record.revoked_at);
        }
        Some(position)
    }

    pub fn authorisation(&self, id: &str) -> Option<&AuthorisationEntry> {
        self.authorisation_index
            .get(id)
            .map(|&position| &self.authorisations[position])
    }

    pub fn action(&self, id: &str) -> Option<&ActionRecord> {
        self.action_index
            .get(id)
            .map(|&position| &self.action_chain[position])
    }

    /// Position of an action in the action chain.
    pub fn action_position(&self, id: &str) -> Option<usize> {
        self.action_index.get(id).copied()
    }

    /// Current state of every grant, in grant order.
    pub fn authorisations(&self) -> &[AuthorisationEntry] {
        &self.authorisations
    }

    pub fn authority_chain(&self) -> &[AuthorityEvent] {
        &self.authority_chain
    }

    pub fn action_chain(&self) -> &[ActionRecord] {
        &self.action_chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledger_chain::{verify_chain, AuthorisationScope, GENESIS_HASH};

    fn grant(description: &str) -> AuthorisationEntry {
        AuthorisationEntry::new(
            "principal-1",
            "agent-1",
            AuthorisationScope::Specific,
            description,
            vec![],
            None,
            Utc::now(),
        )
    }

    #[test]
    fn test_append_links_chain() {
        let mut store = LedgerStore::new();
        let first = store.append_authorisation(grant("first")).clone();
        let second = store.append_authorisation(grant("second")).clone();

        assert_eq!(first.previous_hash, GENESIS_HASH);
        assert_eq!(second.previous_hash, first.hash);
        assert_eq!(store.authority_chain().len(), 2);
        assert!(verify_chain(store.authority_chain()).valid);
    }

    #[test]
    fn test_revocation_appends_event() {
        let mut store = LedgerStore::new();
        let id = store.append_authorisation(grant("first")).id.clone();
        let grant_hash = store.authorisation(&id).unwrap().hash.clone();

        let revoked_at = Utc::now();
        let entry = store
            .append_revocation(RevocationRecord::new(&id, revoked_at, None))
            .unwrap();
        assert!(entry.revoked);
        assert_eq!(entry.revoked_at, Some(revoked_at));
        assert_eq!(entry.hash, grant_hash);

        match &store.authority_chain()[0] {
            AuthorityEvent::Granted(granted) => {
                assert!(granted.revoked);
                assert_eq!(granted.revoked_at, Some(revoked_at));
            }
            other => panic!("expected a grant, got {:?}", other),
        }

        assert_eq!(store.authority_chain().len(), 2);
        assert!(verify_chain(store.authority_chain()).valid);
    }

    #[test]
    fn test_revocation_of_unknown_id() {
        let mut store = LedgerStore::new();
        assert!(store
            .append_revocation(RevocationRecord::new("missing", Utc::now(), None))
            .is_none());
        assert_eq!(store.authority_chain().len(), 1);
        assert!(store.authorisations().is_empty());
    }

    #[test]
    fn test_rebuild_from_chains() {
        let mut store = LedgerStore::new();
        let id = store.append_authorisation(grant("first")).id.clone();
        store.append_authorisation(grant("second"));
        store.append_revocation(RevocationRecord::new(&id, Utc::now(), Some("done".into())));
        let action = ActionRecord::new(
            "agent-1",
            &id,
            "payment",
            "",
            Default::default(),
            None,
            Utc::now(),
        );
        let action_id = store.append_action(action).id.clone();

        let rebuilt = LedgerStore::from_chains(
            store.authority_chain().to_vec(),
            store.action_chain().to_vec(),
        );

        assert_eq!(rebuilt.authorisations(), store.authorisations());
        assert!(rebuilt.authorisation(&id).unwrap().revoked);
        assert_eq!(rebuilt.action_position(&action_id), Some(0));
    }
}
