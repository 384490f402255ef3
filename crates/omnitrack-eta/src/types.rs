//! ETA result types. Derived values only — recomputed per request, never
//! stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived confidence bucket. Pure function of the score; never set
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            ConfidenceLevel::High
        } else if score >= 50 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Where the point estimate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtaSource {
    /// The platform reported minutes remaining (or an arrival instant).
    Platform,
    /// Derived locally from status stage or distance/speed.
    Estimated,
}

/// Display window around the point estimate. Present only when confidence
/// is below `High`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EtaRange {
    pub min_minutes: f64,
    pub max_minutes: f64,
}

/// The full derived estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtaResult {
    pub minutes_remaining: f64,
    pub estimated_arrival: DateTime<Utc>,
    /// 0–100, additive scoring clamped at both ends.
    pub confidence_score: u8,
    pub confidence_level: ConfidenceLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<EtaRange>,
    pub source: EtaSource,
    /// Human-readable scoring contributions, for display and debugging.
    pub factors: Vec<String>,
}
