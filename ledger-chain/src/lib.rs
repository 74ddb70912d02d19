//! Tamper-evident records for agent consent ledgers.
//!
//! Two independent hash chains share one primitive:
//!
//! - **Authority chain**: grants of permission ([`AuthorisationEntry`]) and their
//!   withdrawals ([`RevocationRecord`]), as [`AuthorityEvent`]s
//! - **Action chain**: what the agent actually did ([`ActionRecord`])
//!
//! Every element satisfies `hash == chain_hash(previous_hash, canonical_payload)`
//! and the first element links to [`GENESIS_HASH`].
//!
//! # Example
//!
//! ```
//! use ledger_chain::{chain_hash, verify_chain, Chained, ActionRecord, GENESIS_HASH};
//!
//! let mut action = ActionRecord::new(
//!     "agent-1",
//!     "auth-1",
//!     "payment",
//!     "Paid the electricity bill",
//!     Default::default(),
//!     None,
//!     chrono::Utc::now(),
//! );
//! action.seal(GENESIS_HASH);
//!
//! assert_eq!(action.hash, chain_hash(GENESIS_HASH, &action.canonical_payload()));
//! assert!(verify_chain(&[action]).valid);
//! ```

pub mod chain;
pub mod types;

// Re-export main types
pub use chain::{
    chain_hash, tail_hash, verify_chain, BreakReason, ChainBreak, ChainIntegrity, Chained,
    GENESIS_HASH,
};
pub use types::*;
