//! The wire shape published to realtime subscribers.

use chrono::{DateTime, Utc};
use omnitrack_core::{DriverLocation, UnifiedDelivery};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channels;

/// One published message. `message_id` is assigned at construction so
/// subscribers on either destination can deduplicate at-least-once delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub message_id: Uuid,
    pub channel: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl RealtimeEvent {
    #[must_use]
    pub fn new(
        channel: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            channel: channel.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// A full delivery snapshot on the owning user's delivery channel.
    #[must_use]
    pub fn delivery_updated(user_id: &str, delivery: &UnifiedDelivery) -> Self {
        Self::new(
            channels::user_deliveries(user_id),
            "delivery.updated",
            serde_json::to_value(delivery).unwrap_or(serde_json::Value::Null),
        )
    }

    /// A courier position on the per-delivery location channel.
    #[must_use]
    pub fn location_updated(delivery_id: &str, location: &DriverLocation) -> Self {
        Self::new(
            channels::delivery_location(delivery_id),
            "location.updated",
            serde_json::to_value(location).unwrap_or(serde_json::Value::Null),
        )
    }

    /// A connection lifecycle notice (linked, expired, revoked) for one user.
    #[must_use]
    pub fn connection_changed(user_id: &str, payload: serde_json::Value) -> Self {
        Self::new(
            channels::user_connections(user_id),
            "connection.changed",
            payload,
        )
    }
}
