//! The confidence engine: point estimate, score, level, range.

use chrono::{Duration, Utc};
use omnitrack_core::geo;
use omnitrack_core::platform::OrderCategory;
use omnitrack_core::{DeliveryStatus, UnifiedDelivery};

use crate::types::{ConfidenceLevel, EtaRange, EtaResult, EtaSource};

/// Per-category multiplier on locally derived estimates. Restaurant courier
/// time is the 1.0 baseline; heavier baskets and parcel routes run longer.
fn category_modifier(category: OrderCategory) -> (f64, Option<&'static str>) {
    match category {
        OrderCategory::Restaurant => (1.0, None),
        OrderCategory::Grocery => (1.15, Some("grocery handling time")),
        OrderCategory::Warehouse => (1.15, Some("warehouse-club handling time")),
        OrderCategory::Alcohol => (1.10, Some("ID check at the door")),
        OrderCategory::Parcel => (1.25, Some("multi-stop parcel route")),
    }
}

/// Fallback minutes by lifecycle stage when the platform reports nothing
/// usable and no distance is available.
fn stage_minutes(status: DeliveryStatus) -> f64 {
    match status.stage() {
        Some(0) => 35.0,
        Some(1) => 25.0,
        Some(2) => 20.0,
        Some(3) => 18.0,
        Some(4) => 15.0,
        Some(5) => 12.0,
        Some(6) => 3.0,
        // Delayed carries no stage; assume a long remainder.
        _ => 45.0,
    }
}

/// Straight-line courier-to-door estimate, when both positions are known.
fn distance_estimate(delivery: &UnifiedDelivery) -> Option<(f64, f64)> {
    let loc = delivery.driver.as_ref()?.location.as_ref()?;
    let (dest_lat, dest_lng) = (delivery.destination.lat?, delivery.destination.lng?);
    let distance_km = geo::haversine_km(loc.lat, loc.lng, dest_lat, dest_lng);
    let minutes = geo::minutes_at_speed(distance_km, loc.speed.unwrap_or(0.0))?;
    Some((minutes, distance_km))
}

/// Derive an [`EtaResult`] from a delivery. Returns `None` for terminal
/// deliveries — there is nothing left to estimate.
#[must_use]
pub fn compute_eta(delivery: &UnifiedDelivery, accuracy_weight: u8) -> Option<EtaResult> {
    if delivery.status.is_terminal() {
        return None;
    }

    let now = Utc::now();
    let mut factors = Vec::new();

    // Base estimate, preferring what the platform itself reports.
    let platform_minutes = delivery
        .eta
        .minutes_remaining
        .filter(|m| m.is_finite() && *m > 0.0)
        .or_else(|| {
            delivery.eta.estimated_arrival.and_then(|at| {
                let minutes = (at - now).num_seconds() as f64 / 60.0;
                (minutes > 0.0).then_some(minutes)
            })
        });
    let derived = distance_estimate(delivery);

    let (mut minutes, source) = match platform_minutes {
        Some(m) => {
            factors.push("platform-reported estimate".to_owned());
            (m, EtaSource::Platform)
        }
        None => {
            let base = match derived {
                None => {
                    factors.push("status-stage heuristic".to_owned());
                    stage_minutes(delivery.status)
                }
                Some((m, km)) => {
                    factors.push(format!("distance/speed estimate ({km:.1} km out)"));
                    m
                }
            };
            (base, EtaSource::Estimated)
        }
    };

    // The category modifier applies to the locally derived component only;
    // platform-reported minutes already include handling time.
    if source == EtaSource::Estimated {
        let (factor, label) = category_modifier(delivery.platform.category());
        minutes *= factor;
        if let Some(label) = label {
            factors.push(label.to_owned());
        }
    }

    // Additive confidence scoring.
    let mut score: i32 = 50;
    if source == EtaSource::Platform {
        score += 10;
    }
    if delivery
        .driver
        .as_ref()
        .is_some_and(|d| d.location.is_some())
    {
        score += 15;
        factors.push("live driver location".to_owned());
    }
    score += i32::from(accuracy_weight.min(15));
    if accuracy_weight > 0 {
        factors.push("historical platform accuracy".to_owned());
    }
    let age = now - delivery.status_updated_at;
    if age <= Duration::minutes(5) {
        score += 10;
        factors.push("fresh status update".to_owned());
    } else if age >= Duration::minutes(30) {
        score -= 10;
        factors.push("stale status data".to_owned());
    }
    if let (Some(reported), Some((derived_minutes, _))) = (platform_minutes, derived) {
        let larger = reported.max(derived_minutes).max(1.0);
        if (reported - derived_minutes).abs() / larger > 0.5 {
            score -= 15;
            factors.push("platform and derived estimates disagree".to_owned());
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let confidence_score = score.clamp(0, 100) as u8;
    let confidence_level = ConfidenceLevel::from_score(confidence_score);

    let range = match confidence_level {
        ConfidenceLevel::High => None,
        ConfidenceLevel::Medium => Some(window(minutes, 0.25, 2.0)),
        ConfidenceLevel::Low => Some(window(minutes, 0.5, 5.0)),
    };

    tracing::debug!(
        delivery = %delivery.id,
        minutes = format!("{minutes:.1}"),
        score = confidence_score,
        "computed eta"
    );

    Some(EtaResult {
        minutes_remaining: minutes,
        estimated_arrival: now + Duration::seconds((minutes * 60.0) as i64),
        confidence_score,
        confidence_level,
        range,
        source,
        factors,
    })
}

/// A window centered on the estimate whose half-width is a fraction of it,
/// with a floor so short ETAs still show a meaningful spread.
fn window(minutes: f64, fraction: f64, min_half_width: f64) -> EtaRange {
    let half = (minutes * fraction).max(min_half_width);
    EtaRange {
        min_minutes: (minutes - half).max(0.0),
        max_minutes: minutes + half,
    }
}
