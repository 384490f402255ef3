//! Display formatting for ETA values.

use crate::types::EtaRange;

/// Human-readable minutes: `"Arriving now"`, `"N min"`, `"H hr"`, or
/// `"H hr M min"`.
#[must_use]
pub fn format_eta_display(minutes: f64) -> String {
    if minutes < 1.0 {
        return "Arriving now".to_owned();
    }
    #[allow(clippy::cast_possible_truncation)]
    let whole = minutes.round() as i64;
    if whole < 60 {
        return format!("{whole} min");
    }
    let hours = whole / 60;
    let rem = whole % 60;
    if rem == 0 {
        format!("{hours} hr")
    } else {
        format!("{hours} hr {rem} min")
    }
}

/// `"10-21 min"` with each bound rounded to the nearest integer
/// independently.
#[must_use]
pub fn format_eta_range(range: Option<&EtaRange>) -> Option<String> {
    range.map(|r| {
        format!(
            "{}-{} min",
            r.min_minutes.round(),
            r.max_minutes.round()
        )
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtaChangeKind {
    Faster,
    Slower,
}

/// Outcome of comparing two consecutive estimates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtaChange {
    pub changed: bool,
    pub kind: Option<EtaChangeKind>,
    pub difference: f64,
}

/// Minutes of movement below which an update is considered noise.
pub const DEFAULT_CHANGE_THRESHOLD: f64 = 3.0;

/// Flag a meaningful swing between `prev` and `next` minutes, using the
/// default threshold.
#[must_use]
pub fn significant_eta_change(prev: f64, next: f64) -> EtaChange {
    significant_eta_change_with_threshold(prev, next, DEFAULT_CHANGE_THRESHOLD)
}

#[must_use]
pub fn significant_eta_change_with_threshold(prev: f64, next: f64, threshold: f64) -> EtaChange {
    let difference = (next - prev).abs();
    if difference < threshold {
        return EtaChange {
            changed: false,
            kind: None,
            difference,
        };
    }
    EtaChange {
        changed: true,
        kind: Some(if next < prev {
            EtaChangeKind::Faster
        } else {
            EtaChangeKind::Slower
        }),
        difference,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_boundaries() {
        assert_eq!(format_eta_display(0.0), "Arriving now");
        assert_eq!(format_eta_display(0.9), "Arriving now");
        assert_eq!(format_eta_display(59.0), "59 min");
        assert_eq!(format_eta_display(60.0), "1 hr");
        assert_eq!(format_eta_display(90.0), "1 hr 30 min");
        assert_eq!(format_eta_display(120.0), "2 hr");
    }

    #[test]
    fn range_bounds_round_independently() {
        let range = EtaRange {
            min_minutes: 10.4,
            max_minutes: 20.6,
        };
        assert_eq!(format_eta_range(Some(&range)).as_deref(), Some("10-21 min"));
        assert_eq!(format_eta_range(None), None);
    }

    #[test]
    fn small_swings_are_noise() {
        let change = significant_eta_change(20.0, 22.0);
        assert!(!change.changed);
        assert!(change.kind.is_none());
    }

    #[test]
    fn big_drop_is_faster() {
        let change = significant_eta_change(20.0, 10.0);
        assert!(change.changed);
        assert_eq!(change.kind, Some(EtaChangeKind::Faster));
        assert!((change.difference - 10.0).abs() < 1e-9);
    }

    #[test]
    fn big_rise_is_slower() {
        let change = significant_eta_change(10.0, 20.0);
        assert_eq!(change.kind, Some(EtaChangeKind::Slower));
    }

    #[test]
    fn exact_threshold_counts_as_changed() {
        assert!(significant_eta_change(20.0, 23.0).changed);
    }
}
