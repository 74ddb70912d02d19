//! Agent consent ledger.
//!
//! A tamper-evident record of what a human authorised an agent to do and what
//! the agent actually did. Two hash chains hold the history:
//!
//! - the **authority chain**: grants ([`AuthorisationEntry`]) and revocations
//! - the **action chain**: every [`ActionRecord`] the agent reports
//!
//! On top of them, [`ConsentLedger`] matches each action against the grant it
//! claims and mines the history for scope creep.
//!
//! ```
//! use consent_ledger::{
//!     AuthorisationScope, ConsentConstraint, ConsentLedger, MatchStatus, NewAction,
//!     NewAuthorisation,
//! };
//!
//! let mut ledger = ConsentLedger::new("alice");
//! let grant = ledger.authorise(
//!     NewAuthorisation::new("assistant", AuthorisationScope::Standing, "Pay utility bills")
//!         .with_constraint(ConsentConstraint::monetary_limit(500.0)),
//! );
//! let action = ledger.record_action(
//!     NewAction::new("assistant", &grant.id, "payment", "Electricity").with_param("amount", 320),
//! );
//!
//! let verdict = ledger.check_consent(&action.id).unwrap();
//! assert_eq!(verdict.status, MatchStatus::WithinBounds);
//! assert!(ledger.verify().valid);
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod report;
pub mod snapshot;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use error::{LedgerError, RecordKind, Result};
pub use ledger::{ConsentLedger, NewAction, NewAuthorisation};
pub use report::{ConsentStats, IntegrityReport, LedgerReport};
pub use snapshot::{LedgerSnapshot, SNAPSHOT_SCHEMA};
pub use store::LedgerStore;

// Re-export the record and verdict types callers need
pub use consent_engine::{
    ConsentMatch, ConsentViolation, DriftConfig, MatchStatus, PatternType, ScopeCreepPattern,
    ViolationSeverity, ViolationType,
};
pub use ledger_chain::{
    chain_hash, ActionRecord, AuthorisationEntry, AuthorisationScope, AuthorityEvent,
    BreakReason, ChainBreak, ChainIntegrity, Chained, ConsentConstraint, ConstraintType,
    RevocationRecord, GENESIS_HASH,
};
