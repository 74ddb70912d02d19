//! Consent matching and scope-creep detection.
//!
//! Pure functions over ledger records:
//!
//! - [`ConsentMatcher`]: compares one action to its claimed authorisation and
//!   yields a [`ConsentMatch`]
//! - [`DriftDetector`]: mines the full history for [`ScopeCreepPattern`]s, slow
//!   trends of overreach that no single match reveals
//!
//! Neither keeps state between calls; callers recompute on demand.

pub mod config;
pub mod constraints;
pub mod drift;
pub mod matcher;
pub mod types;

// Re-export main types
pub use config::{DriftConfig, MIN_DATA_POINTS};
pub use drift::{period_bucket, DriftDetector, DriftInput, PatternDetector};
pub use matcher::ConsentMatcher;
pub use types::*;
