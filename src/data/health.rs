//! Health classification from error and call counts.

use serde::{Deserialize, Serialize};

/// Error rate above which an element is critical.
pub const CRITICAL_ERROR_RATE: f64 = 0.10;

/// Error rate above which an element is in warning state.
pub const WARNING_ERROR_RATE: f64 = 0.01;

/// Health tier for a service or a call relationship.
///
/// Ordered from least to most severe so that `max()` over a set of tiers
/// yields the worst one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTier {
    /// No traffic observed; health cannot be judged.
    Unknown,
    Good,
    Warning,
    Critical,
}

impl HealthTier {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            HealthTier::Unknown => "--",
            HealthTier::Good => "OK",
            HealthTier::Warning => "WARN",
            HealthTier::Critical => "CRIT",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthTier::Unknown => "Unknown",
            HealthTier::Good => "Good",
            HealthTier::Warning => "Warning",
            HealthTier::Critical => "Critical",
        }
    }
}

/// Classify an element from its error and call counts.
pub fn classify(error_count: u64, call_count: u64) -> HealthTier {
    if call_count == 0 {
        return HealthTier::Unknown;
    }

    let error_rate = error_count as f64 / call_count as f64;
    if error_rate > CRITICAL_ERROR_RATE {
        HealthTier::Critical
    } else if error_rate > WARNING_ERROR_RATE {
        HealthTier::Warning
    } else {
        HealthTier::Good
    }
}

/// Error rate as a percentage with two decimals, `"0.00"` without traffic.
pub fn format_error_rate(error_count: u64, call_count: u64) -> String {
    if call_count == 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", error_count as f64 / call_count as f64 * 100.0)
}

/// Number of elements per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub total: usize,
    pub unknown: usize,
    pub good: usize,
    pub warning: usize,
    pub critical: usize,
}

impl TierCounts {
    pub fn from_tiers(tiers: impl IntoIterator<Item = HealthTier>) -> Self {
        let mut counts = Self::default();
        for tier in tiers {
            counts.total += 1;
            match tier {
                HealthTier::Unknown => counts.unknown += 1,
                HealthTier::Good => counts.good += 1,
                HealthTier::Warning => counts.warning += 1,
                HealthTier::Critical => counts.critical += 1,
            }
        }
        counts
    }

    /// The most severe tier present, ignoring unknown.
    pub fn worst(&self) -> HealthTier {
        if self.critical > 0 {
            HealthTier::Critical
        } else if self.warning > 0 {
            HealthTier::Warning
        } else if self.good > 0 {
            HealthTier::Good
        } else {
            HealthTier::Unknown
        }
    }
}
