//! Configuration for a consent ledger.

use serde::{Deserialize, Serialize};
use std::path::Path;

use consent_engine::DriftConfig;

use crate::error::Result;

/// Configuration for a [`ConsentLedger`](crate::ConsentLedger).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Drift detection thresholds. `drift.window_hours` is also the period
    /// used to count actions for `frequency_limit` constraints.
    pub drift: DriftConfig,
    /// Log a warning whenever `verify()` finds a broken chain
    pub warn_on_integrity_failure: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            drift: DriftConfig::default(),
            warn_on_integrity_failure: true,
        }
    }
}

impl LedgerConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Load config from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&yaml)?)
    }

    /// Width of the frequency-counting period in seconds.
    pub fn window_secs(&self) -> i64 {
        self.drift.window_secs()
    }
}
