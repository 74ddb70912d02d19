//! End-to-end ledger behaviour: chains, matching, drift and snapshots

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;

use consent_ledger::{
    chain_hash, AuthorisationScope, AuthorityEvent, BreakReason, Chained, Clock,
    ConsentConstraint, ConsentLedger, LedgerConfig, LedgerError, LedgerSnapshot, ManualClock,
    MatchStatus, NewAction, NewAuthorisation, PatternType, ViolationSeverity, ViolationType,
    GENESIS_HASH,
};

fn new_ledger() -> (ConsentLedger, ManualClock) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
    let ledger = ConsentLedger::new("principal-1").with_clock(Arc::new(clock.clone()));
    (ledger, clock)
}

fn bills(limit: f64) -> NewAuthorisation {
    NewAuthorisation::new("agent-1", AuthorisationScope::Standing, "Pay household bills")
        .with_constraint(ConsentConstraint::monetary_limit(limit))
}

fn payment(auth_id: &str, amount: u64) -> NewAction {
    NewAction::new("agent-1", auth_id, "payment", "Paid a bill").with_param("amount", amount)
}

/// A ledger with a few grants, a revocation and some actions.
fn populated() -> (ConsentLedger, ManualClock) {
    let (mut ledger, clock) = new_ledger();
    let bills_id = ledger.authorise(bills(500.0)).id;
    let travel_id = ledger
        .authorise(
            NewAuthorisation::new("agent-1", AuthorisationScope::Categorical, "Book travel")
                .with_constraint(ConsentConstraint::domain_restriction(&["travel"])),
        )
        .id;
    for amount in [100, 250, 400] {
        clock.advance(Duration::minutes(30));
        ledger.record_action(payment(&bills_id, amount));
    }
    ledger.record_action(
        NewAction::new("agent-1", &travel_id, "booking", "Train tickets")
            .with_param("domain", "travel")
            .with_trace_ref("trace://decisions/42"),
    );
    ledger.revoke_with_reason(&travel_id, "trip cancelled").unwrap();
    (ledger, clock)
}

#[test]
fn test_chain_hash_and_link_laws() {
    let (ledger, _) = populated();

    let events = ledger.authority_events();
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.hash(), chain_hash(event.previous_hash(), &event.canonical_payload()));
        let expected_prev = if i == 0 { GENESIS_HASH } else { events[i - 1].hash() };
        assert_eq!(event.previous_hash(), expected_prev);
    }

    let actions = ledger.actions();
    for (i, action) in actions.iter().enumerate() {
        assert_eq!(action.hash, chain_hash(&action.previous_hash, &action.canonical_payload()));
        let expected_prev = if i == 0 { GENESIS_HASH } else { actions[i - 1].hash.as_str() };
        assert_eq!(action.previous_hash, expected_prev);
    }
}

#[test]
fn test_monetary_limit_verdicts() {
    let (mut ledger, _) = new_ledger();
    let id = ledger.authorise(bills(500.0)).id;

    let ok = ledger.record_action(payment(&id, 320)).id;
    let over = ledger.record_action(payment(&id, 1200)).id;

    let ok = ledger.check_consent(&ok).unwrap();
    assert_eq!(ok.status, MatchStatus::WithinBounds);
    assert!(ok.violations.is_empty());

    let over = ledger.check_consent(&over).unwrap();
    assert_eq!(over.status, MatchStatus::Exceeded);
    assert_eq!(over.violations.len(), 1);
    assert_eq!(over.violations[0].constraint_type, ViolationType::MonetaryLimit);
    assert_eq!(over.violations[0].severity, ViolationSeverity::Critical);
}

#[test]
fn test_unknown_authorisation_is_a_finding() {
    let (mut ledger, _) = new_ledger();
    let action = ledger.record_action(payment("never-granted", 10));

    let verdict = ledger.check_consent(&action.id).unwrap();
    assert_eq!(verdict.status, MatchStatus::Exceeded);
    assert_eq!(verdict.violations[0].constraint_type, ViolationType::Authorisation);
}

#[test]
fn test_revoked_authorisation() {
    let (mut ledger, clock) = new_ledger();
    let id = ledger.authorise(bills(500.0)).id;
    ledger.revoke(&id).unwrap();
    clock.advance(Duration::minutes(1));

    // Well within the limit, but the grant is gone.
    let action = ledger.record_action(payment(&id, 1));
    let verdict = ledger.check_consent(&action.id).unwrap();
    assert_eq!(verdict.status, MatchStatus::Revoked);
    assert_eq!(verdict.violations[0].constraint_type, ViolationType::Revocation);
}

#[test]
fn test_emergency_awaits_ratification() {
    let (mut ledger, _) = new_ledger();
    let id = ledger
        .authorise(
            NewAuthorisation::new("agent-1", AuthorisationScope::Emergency, "Medical emergency")
                .with_constraint(ConsentConstraint::monetary_limit(10.0))
                .with_constraint(ConsentConstraint::domain_restriction(&["medical"]))
                .with_constraint(ConsentConstraint::approval_required())
                .with_constraint(ConsentConstraint::recipient_restriction(&["St Mary's"]))
                .with_constraint(ConsentConstraint::frequency_limit(0)),
        )
        .id;

    let action = ledger.record_action(
        NewAction::new("agent-1", &id, "payment", "Ambulance")
            .with_param("amount", 5000)
            .with_param("domain", "transport")
            .with_param("recipient", "City Ambulance Co"),
    );

    let verdict = ledger.check_consent(&action.id).unwrap();
    assert_eq!(verdict.status, MatchStatus::PendingRatification);
    assert!(verdict.violations.is_empty());
}

#[test]
fn test_gradual_expansion_requires_rising_ratios() {
    let (ledger, _) = populated();
    let bills_id = ledger.authorisations()[0].id.clone();

    let patterns = ledger.detect_scope_creep();
    let expansion: Vec<_> = patterns
        .iter()
        .filter(|p| p.pattern_type == PatternType::GradualExpansion)
        .collect();
    assert_eq!(expansion.len(), 1);
    assert_eq!(expansion[0].authorisation_id.as_deref(), Some(bills_id.as_str()));
    assert_eq!(expansion[0].evidence.len(), 3);
    assert!((expansion[0].severity - 0.7).abs() < 1e-9);

    let (mut reordered, clock) = new_ledger();
    let id = reordered.authorise(bills(500.0)).id;
    for amount in [400, 250, 100] {
        clock.advance(Duration::minutes(30));
        reordered.record_action(payment(&id, amount));
    }
    assert!(reordered
        .detect_scope_creep()
        .iter()
        .all(|p| p.pattern_type != PatternType::GradualExpansion));
}

#[test]
fn test_thin_history_reports_nothing() {
    let (mut ledger, clock) = new_ledger();
    let id = ledger.authorise(bills(500.0)).id;
    for amount in [300, 480] {
        clock.advance(Duration::days(1));
        ledger.record_action(payment(&id, amount));
    }
    for _ in 0..2 {
        ledger.record_action(payment("never-granted", 900));
    }

    let patterns = ledger.detect_scope_creep();
    assert!(patterns
        .iter()
        .all(|p| p.authorisation_id.as_deref() != Some(id.as_str())));
    assert!(patterns.is_empty());
}

#[test]
fn test_authority_inflation_and_frequency_escalation() {
    let (mut ledger, clock) = new_ledger();
    let id = ledger
        .authorise(NewAuthorisation::new("agent-1", AuthorisationScope::Standing, "Messages"))
        .id;

    // 1, 2, then 3 actions on successive days.
    for day in 1..=3 {
        for _ in 0..day {
            ledger.record_action(NewAction::new("agent-1", &id, "message", "Sent"));
        }
        clock.advance(Duration::days(1));
    }
    for _ in 0..3 {
        ledger.record_action(payment("forged-grant", 50));
    }

    let patterns = ledger.detect_scope_creep();
    let kinds: Vec<_> = patterns.iter().map(|p| p.pattern_type).collect();
    assert!(kinds.contains(&PatternType::FrequencyEscalation));
    assert!(kinds.contains(&PatternType::AuthorityInflation));
    assert!(patterns.iter().all(|p| p.evidence.len() >= 3));
}

#[test]
fn test_frequency_window_follows_config() {
    let mut config = LedgerConfig::default();
    config.drift.window_hours = 1;
    let (ledger, clock) = new_ledger();
    let mut ledger = ledger.with_config(config);

    let id = ledger
        .authorise(
            NewAuthorisation::new("agent-1", AuthorisationScope::Standing, "Reorder supplies")
                .with_constraint(ConsentConstraint::frequency_limit(1)),
        )
        .id;

    let first = ledger.record_action(NewAction::new("agent-1", &id, "order", "Paper")).id;
    clock.advance(Duration::hours(2));
    let second = ledger.record_action(NewAction::new("agent-1", &id, "order", "Toner")).id;
    let third = ledger.record_action(NewAction::new("agent-1", &id, "order", "Pens")).id;

    assert_eq!(ledger.check_consent(&first).unwrap().status, MatchStatus::WithinBounds);
    assert_eq!(ledger.check_consent(&second).unwrap().status, MatchStatus::WithinBounds);
    let third = ledger.check_consent(&third).unwrap();
    assert_eq!(third.status, MatchStatus::Exceeded);
    assert_eq!(third.violations[0].constraint_type, ViolationType::FrequencyLimit);
}

#[test]
fn test_export_import_roundtrip() {
    let (ledger, _) = populated();
    let json = serde_json::to_string(&ledger.export()).unwrap();

    let snapshot: LedgerSnapshot = serde_json::from_str(&json).unwrap();
    let restored = ConsentLedger::import(snapshot).unwrap();

    assert_eq!(restored.principal_id(), ledger.principal_id());
    assert_eq!(restored.authorisations(), ledger.authorisations());
    assert_eq!(restored.actions(), ledger.actions());
    assert_eq!(restored.authority_events(), ledger.authority_events());
    assert_eq!(restored.verify(), ledger.verify());
    assert!(restored.verify().valid);
    assert!(restored.authorisations()[1].revoked);
    assert_eq!(
        restored.actions()[3].trace_ref.as_deref(),
        Some("trace://decisions/42")
    );
}

#[test]
fn test_import_rejects_other_schema() {
    let (ledger, _) = populated();
    let mut value = serde_json::to_value(ledger.export()).unwrap();
    value["schema"] = json!("agent-consent-ledger/v0");

    let snapshot: LedgerSnapshot = serde_json::from_value(value).unwrap();
    let err = ConsentLedger::import(snapshot).err().unwrap();
    assert!(matches!(err, LedgerError::SchemaMismatch { .. }));
}

#[test]
fn test_revoking_any_position_keeps_chain_valid() {
    for target in 0..4 {
        let (mut ledger, clock) = new_ledger();
        let ids: Vec<String> = (0..4).map(|_| ledger.authorise(bills(100.0)).id).collect();
        let hashes: Vec<String> = ledger.authorisations().iter().map(|a| a.hash.clone()).collect();

        clock.advance(Duration::hours(1));
        let revoked = ledger.revoke(&ids[target]).unwrap();
        assert!(revoked.revoked);
        assert_eq!(revoked.revoked_at, Some(clock.now()));

        let report = ledger.verify();
        assert!(report.valid, "revoking position {} broke the chain", target);
        assert_eq!(report.authorisations_checked, 5);

        let after: Vec<String> = ledger.authorisations().iter().map(|a| a.hash.clone()).collect();
        assert_eq!(after, hashes);
    }
}

#[test]
fn test_tampered_action_is_detected() {
    let (ledger, _) = populated();
    let mut snapshot = ledger.export();
    snapshot.action_chain[1]
        .parameters
        .insert("amount".to_string(), json!(25));

    let tampered = ConsentLedger::import(snapshot).unwrap();
    let report = tampered.verify();
    assert!(!report.valid);
    assert!(report.authorisation_chain.valid);
    assert_eq!(report.actions_checked, 4);

    let first_break = report.action_chain.first_break.unwrap();
    assert_eq!(first_break.position, 1);
    assert_eq!(first_break.reason, BreakReason::HashMismatch);
}

#[test]
fn test_reordered_chain_is_detected() {
    let (ledger, _) = populated();
    let mut snapshot = ledger.export();
    snapshot.action_chain.swap(0, 1);

    let report = ConsentLedger::import(snapshot).unwrap().verify();
    let first_break = report.action_chain.first_break.unwrap();
    assert_eq!(first_break.position, 0);
    assert_eq!(first_break.reason, BreakReason::BrokenLink);
}

#[test]
fn test_revocation_flag_only_comes_from_events() {
    let (mut ledger, _) = new_ledger();
    let id = ledger.authorise(bills(500.0)).id;
    let mut value = serde_json::to_value(ledger.export()).unwrap();
    value["authority_chain"][0]["revoked"] = json!(true);

    let snapshot: LedgerSnapshot = serde_json::from_value(value).unwrap();
    let restored = ConsentLedger::import(snapshot).unwrap();
    assert!(!restored.get_authorisation(&id).unwrap().revoked);
    assert!(matches!(
        &restored.authority_events()[0],
        AuthorityEvent::Granted(entry) if !entry.revoked
    ));
    assert!(restored.verify().valid);
}

#[test]
fn test_snapshot_shows_revoked_grants() {
    let (ledger, _) = populated();
    let travel_id = ledger.authorisations()[1].id.clone();
    let revoked_at = ledger.get_authorisation(&travel_id).unwrap().revoked_at;
    assert!(revoked_at.is_some());

    let exported = ledger.export();
    let report = ledger.report(false);
    for snapshot in [&exported, &report.snapshot] {
        let grant = snapshot
            .authority_chain
            .iter()
            .find_map(|event| match event {
                AuthorityEvent::Granted(entry) if entry.id == travel_id => Some(entry),
                _ => None,
            })
            .unwrap();
        assert!(grant.revoked);
        assert_eq!(grant.revoked_at, revoked_at);
    }

    // Grant digests exclude revocation state, so the chain still verifies.
    assert!(ConsentLedger::import(exported).unwrap().verify().valid);
}
