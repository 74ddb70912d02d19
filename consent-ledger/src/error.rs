//! Error types for ledger operations.

use std::fmt;

/// Kind of record an identifier failed to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Authorisation,
    Action,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authorisation => f.write_str("Authorisation"),
            Self::Action => f.write_str("Action"),
        }
    }
}

/// Error types for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Identifier absent from the index
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    /// Snapshot carries a different schema tag
    #[error("Snapshot schema mismatch: expected '{expected}', found '{found}'")]
    SchemaMismatch { expected: String, found: String },

    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml::Error),

    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    pub(crate) fn authorisation_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: RecordKind::Authorisation,
            id: id.to_string(),
        }
    }

    pub(crate) fn action_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: RecordKind::Action,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
