//! Snapshot format: the only persisted or exchanged representation of a ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledger_chain::{ActionRecord, AuthorityEvent};

use crate::error::{LedgerError, Result};

/// Schema tag every snapshot must carry.
pub const SNAPSHOT_SCHEMA: &str = "agent-consent-ledger/v1";

/// Both chains of one ledger, in creation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Schema tag; must equal [`SNAPSHOT_SCHEMA`] to be imported
    pub schema: String,
    /// Principal the ledger belongs to
    pub principal_id: String,
    /// When the snapshot was taken
    pub exported_at: DateTime<Utc>,
    /// Grants and revocations
    pub authority_chain: Vec<AuthorityEvent>,
    /// Actions
    pub action_chain: Vec<ActionRecord>,
}

impl LedgerSnapshot {
    /// Reject snapshots written under any other schema.
    pub fn check_schema(&self) -> Result<()> {
        if self.schema == SNAPSHOT_SCHEMA {
            Ok(())
        } else {
            Err(LedgerError::SchemaMismatch {
                expected: SNAPSHOT_SCHEMA.to_string(),
                found: self.schema.clone(),
            })
        }
    }
}
