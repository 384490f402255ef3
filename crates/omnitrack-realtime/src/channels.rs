//! Channel naming scheme shared by the internal bus and the external relay.
//!
//! Both destinations address subscribers by these names, so a consumer can
//! move between them without re-learning the topology.

/// Global channel for platform-wide health and status notices.
pub const SYSTEM_STATUS: &str = "system:status";

/// Delivery updates (status changes, new orders, ETA revisions) for one user.
#[must_use]
pub fn user_deliveries(user_id: &str) -> String {
    format!("user:{user_id}:deliveries")
}

/// Connection lifecycle events (linked, expired, revoked) for one user.
#[must_use]
pub fn user_connections(user_id: &str) -> String {
    format!("user:{user_id}:connections")
}

/// High-frequency courier position updates for one delivery.
#[must_use]
pub fn delivery_location(delivery_id: &str) -> String {
    format!("delivery:{delivery_id}:location")
}
