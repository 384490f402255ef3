//! Webhook envelope and partial-update types.
//!
//! A push delivery either carries a complete order snapshot (normalized to a
//! full [`UnifiedDelivery`]) or a delta — a bare status change or a location
//! ping — which is only meaningful merged into a previously cached record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::delivery::{DriverLocation, UnifiedDelivery};
use crate::platform::Platform;
use crate::status::DeliveryStatus;

/// Envelope around a raw, platform-specific webhook body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub platform: Platform,
    pub event_type: String,
    /// Idempotency key: `(platform, event_id)` identifies one delivery of
    /// one event.
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A partial update extracted from a delta-only webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryDelta {
    pub delivery_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<DriverLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes_remaining: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of normalizing a webhook body.
#[derive(Debug, Clone)]
pub enum NormalizedWebhook {
    /// The payload carried a complete snapshot.
    Full(Box<UnifiedDelivery>),
    /// The payload carried only a delta; the caller must merge it into a
    /// cached record.
    Partial(DeliveryDelta),
    /// Not enough data to produce either. Callers treat this as a no-op.
    Insufficient,
}

/// Merge a delta into a cached canonical record.
///
/// Reconciliation rule: the side with the later `status_updated_at` wins;
/// on an exact tie the cached full record beats the partial delta. Location
/// pings are applied regardless of the status outcome when they are newer
/// than the cached driver position.
#[must_use]
pub fn merge_delta(mut cached: UnifiedDelivery, delta: &DeliveryDelta) -> UnifiedDelivery {
    if delta.updated_at > cached.status_updated_at {
        if let Some(status) = delta.status {
            cached.status = status;
            cached.status_updated_at = delta.updated_at;
        }
        if let Some(minutes) = delta.minutes_remaining {
            cached.eta.minutes_remaining = Some(minutes);
        }
    }
    if let Some(location) = delta.location {
        let newer = cached
            .driver
            .as_ref()
            .and_then(|d| d.location.as_ref())
            .is_none_or(|current| location.updated_at > current.updated_at);
        if newer {
            let driver = cached.driver.get_or_insert_with(|| crate::delivery::DriverInfo {
                name: None,
                masked_phone: None,
                rating: None,
                vehicle: None,
                location: None,
            });
            driver.location = Some(location);
        }
    }
    cached
}
