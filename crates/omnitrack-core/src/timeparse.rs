//! Tolerant timestamp parsing for upstream payloads.
//!
//! Platforms report instants as RFC 3339 strings, unix seconds, or unix
//! milliseconds, sometimes as JSON numbers and sometimes as strings.

use chrono::{DateTime, TimeZone, Utc};

/// Parse a timestamp from any of the shapes the upstream platforms use.
///
/// Accepts RFC 3339 / ISO-8601 strings, integer unix seconds, and integer
/// unix milliseconds (disambiguated by magnitude: values above `10^12` are
/// treated as milliseconds). Returns `None` for anything unparseable.
#[must_use]
pub fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => parse_timestamp_str(s),
        serde_json::Value::Number(n) => n.as_i64().and_then(from_unix),
        _ => None,
    }
}

/// String-only variant of [`parse_timestamp`].
#[must_use]
pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Some platforms drop the timezone suffix; assume UTC.
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    s.parse::<i64>().ok().and_then(from_unix)
}

fn from_unix(n: i64) -> Option<DateTime<Utc>> {
    if n > 1_000_000_000_000 {
        Utc.timestamp_millis_opt(n).single()
    } else {
        Utc.timestamp_opt(n, 0).single()
    }
}
