//! ETA confidence engine.
//!
//! Derives an arrival estimate, a 0–100 confidence score, a bucketed
//! confidence level, and an optional display range from a
//! [`omnitrack_core::UnifiedDelivery`]. Everything here is a pure
//! derivation — results are recomputed per request and never stored.

pub mod engine;
pub mod format;
pub mod types;

pub use engine::compute_eta;
pub use format::{
    format_eta_display, format_eta_range, significant_eta_change,
    significant_eta_change_with_threshold, EtaChange, EtaChangeKind, DEFAULT_CHANGE_THRESHOLD,
};
pub use types::{ConfidenceLevel, EtaRange, EtaResult, EtaSource};
