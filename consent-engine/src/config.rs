//! Configuration for scope-creep detection.

use serde::{Deserialize, Serialize};

/// Minimum supporting data points before any pattern is reported.
pub const MIN_DATA_POINTS: usize = 3;

/// Thresholds used by the drift detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Minimum evidence entries for a pattern to be reported
    pub min_data_points: usize,
    /// Width of one counting period (hours). Also used for `frequency_limit` counts.
    pub window_hours: u32,
    /// Final amount/limit ratio at which gradual expansion is reported
    pub expansion_final_ratio: f64,
    /// Out-of-domain actions needed for domain drift
    pub domain_drift_min_outside: usize,
    /// Orphaned failing actions needed for authority inflation
    pub inflation_min_orphans: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            min_data_points: MIN_DATA_POINTS,
            window_hours: 24,
            expansion_final_ratio: 0.7,
            domain_drift_min_outside: 3,
            inflation_min_orphans: 3,
        }
    }
}

impl DriftConfig {
    /// Counting period in seconds; never zero.
    pub fn window_secs(&self) -> i64 {
        i64::from(self.window_hours.max(1)) * 3600
    }
}
