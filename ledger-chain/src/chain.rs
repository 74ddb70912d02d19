//! Hash-chain primitive.
//!
//! Both ledger chains (authority events and actions) are linked the same way:
//! every element stores the digest of its predecessor in `previous_hash` and its
//! own digest in `hash`, where
//!
//! ```text
//! hash = SHA256(previous_hash ‖ canonical_payload)
//! ```
//!
//! Elements carry their position through the explicit `previous_hash` pointer
//! rather than their array index, so a single element can be checked given only
//! its neighbour's digest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// `previous_hash` of the first element in every chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Compute the chain digest of a payload given its predecessor's digest.
pub fn chain_hash(previous_hash: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// An element that can be placed on a hash chain.
pub trait Chained {
    /// Identifier reported when the element breaks the chain.
    fn chain_id(&self) -> &str;

    /// Stored digest of this element.
    fn hash(&self) -> &str;

    /// Stored digest of the preceding element.
    fn previous_hash(&self) -> &str;

    /// Deterministic serialization of every non-hash field.
    fn canonical_payload(&self) -> String;

    /// Overwrite both link fields.
    fn set_links(&mut self, previous_hash: String, hash: String);

    /// Recompute the digest from the stored `previous_hash` and current payload.
    fn compute_hash(&self) -> String {
        chain_hash(self.previous_hash(), &self.canonical_payload())
    }

    /// Link this element after `previous_hash` and store its digest.
    fn seal(&mut self, previous_hash: &str) {
        let hash = chain_hash(previous_hash, &self.canonical_payload());
        self.set_links(previous_hash.to_string(), hash);
    }

    /// Whether the stored digest matches the current content.
    fn is_sealed(&self) -> bool {
        self.hash() == self.compute_hash()
    }
}

/// Digest a new element must link to when appended to `chain`.
pub fn tail_hash<T: Chained>(chain: &[T]) -> &str {
    chain.last().map(Chained::hash).unwrap_or(GENESIS_HASH)
}

/// Why an element failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum BreakReason {
    /// `previous_hash` does not point at the preceding element's digest
    BrokenLink,
    /// Stored digest does not match the element's content
    HashMismatch,
}

/// First element at which a chain failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ChainBreak {
    /// Zero-based position in the chain
    pub position: usize,
    /// Identifier of the offending element
    pub element_id: String,
    /// What failed
    pub reason: BreakReason,
}

/// Result of walking one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ChainIntegrity {
    /// Whether every element passed both checks
    pub valid: bool,
    /// Number of elements walked
    pub checked: usize,
    /// First failure, if any
    pub first_break: Option<ChainBreak>,
}

impl ChainIntegrity {
    /// Integrity of an empty chain.
    pub fn empty() -> Self {
        Self {
            valid: true,
            checked: 0,
            first_break: None,
        }
    }
}

/// Walk a chain front to back, checking pointer continuity and digests.
///
/// The expected pointer advances to each element's *stored* hash, so an edit to
/// any element also surfaces as a broken link on its successor. The walk always
/// covers the whole chain; only the first failure is reported.
pub fn verify_chain<T: Chained>(elements: &[T]) -> ChainIntegrity {
    let mut expected_prev = GENESIS_HASH;
    let mut first_break = None;

    for (position, element) in elements.iter().enumerate() {
        let reason = if element.previous_hash() != expected_prev {
            Some(BreakReason::BrokenLink)
        } else if element.compute_hash() != element.hash() {
            Some(BreakReason::HashMismatch)
        } else {
            None
        };

        if let Some(reason) = reason {
            if first_break.is_none() {
                first_break = Some(ChainBreak {
                    position,
                    element_id: element.chain_id().to_string(),
                    reason,
                });
            }
        }

        expected_prev = element.hash();
    }

    ChainIntegrity {
        valid: first_break.is_none(),
        checked: elements.len(),
        first_break,
    }
}
