//! Geo math for courier positions: distance, heading, interpolation.

use std::f64::consts::PI;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance between two points in kilometres (haversine).
#[must_use]
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Initial bearing from point 1 to point 2, in degrees clockwise from north,
/// normalized to `[0, 360)`.
#[must_use]
pub fn bearing_degrees(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lng = (lng2 - lng1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let y = d_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lng.cos();
    let deg = y.atan2(x) * 180.0 / PI;
    (deg + 360.0) % 360.0
}

/// Linear interpolation between two positions. `t` is clamped to `[0, 1]`.
///
/// Good enough for the sub-kilometre hops between location pings; no
/// great-circle correction.
#[must_use]
pub fn interpolate(lat1: f64, lng1: f64, lat2: f64, lng2: f64, t: f64) -> (f64, f64) {
    let t = t.clamp(0.0, 1.0);
    (lat1 + (lat2 - lat1) * t, lng1 + (lng2 - lng1) * t)
}

/// Travel time in minutes to cover `distance_km` at `speed_mps`, with a
/// floor on speed so a parked courier does not produce an infinite ETA.
/// Returns `None` for non-finite or non-positive distance.
#[must_use]
pub fn minutes_at_speed(distance_km: f64, speed_mps: f64) -> Option<f64> {
    if !distance_km.is_finite() || distance_km <= 0.0 {
        return None;
    }
    // Urban driving floor: ~4.5 m/s (10 mph).
    let speed = speed_mps.max(4.5);
    Some(distance_km * 1000.0 / speed / 60.0)
}
