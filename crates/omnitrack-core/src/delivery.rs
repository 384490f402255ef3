//! `UnifiedDelivery`: the platform-agnostic order record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::status::DeliveryStatus;

/// How a record reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOrigin {
    Poll,
    Webhook,
}

/// Named lifecycle instants. Sparse: a platform only populates the events it
/// actually reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Ordered,
    Confirmed,
    Preparing,
    Ready,
    DriverAssigned,
    PickedUp,
    OutForDelivery,
    Arriving,
    Delivered,
    Cancelled,
}

/// Last known courier position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriverLocation {
    pub lat: f64,
    pub lng: f64,
    /// Degrees clockwise from north, when the platform reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Metres per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Courier details. Contact fields are masked during normalization; raw
/// phone numbers never land in this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<DriverLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Platform-reported arrival estimate, as normalized by the adapter. The
/// confidence machinery in `omnitrack-eta` derives its result from this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EtaInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_arrival: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes_remaining: Option<f64>,
    /// Straight-line distance to the destination in kilometres.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    /// Deliveries the courier will make before this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stops_remaining: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    /// Minor currency units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substituted_with: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInfo {
    pub item_count: u32,
    /// Minor currency units (cents for USD).
    pub total_amount: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItem>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TrackingInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub map_available: bool,
    pub live_updates: bool,
    pub driver_contactable: bool,
}

/// Fetch provenance kept alongside the record for debugging and
/// poll/webhook reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryMeta {
    pub origin: FetchOrigin,
    pub adapter: Platform,
    pub fetched_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

/// The canonical, platform-agnostic delivery record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedDelivery {
    /// Deterministic id derived from `(platform, external order id)`; see
    /// [`crate::ids::derive_delivery_id`].
    pub id: String,
    pub platform: Platform,
    /// Set when a brand's orders are fulfilled by another platform's courier
    /// network (Costco via Instacart, Sam's Club via Shipt).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfilled_by: Option<Platform>,
    pub status: DeliveryStatus,
    pub status_updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverInfo>,
    pub destination: Destination,
    pub eta: EtaInfo,
    pub order: OrderInfo,
    pub tracking: TrackingInfo,
    /// Sparse lifecycle timeline; only events the platform reported.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub timestamps: BTreeMap<LifecycleEvent, DateTime<Utc>>,
    pub meta: DeliveryMeta,
}

impl UnifiedDelivery {
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::derive_delivery_id;

    fn sample() -> UnifiedDelivery {
        UnifiedDelivery {
            id: derive_delivery_id(Platform::Doordash, "8842", None),
            platform: Platform::Doordash,
            fulfilled_by: None,
            status: DeliveryStatus::OutForDelivery,
            status_updated_at: Utc::now(),
            driver: None,
            destination: Destination {
                address: Some("11 Elm St".to_owned()),
                lat: Some(34.0),
                lng: Some(-81.0),
                instructions: None,
            },
            eta: EtaInfo::default(),
            order: OrderInfo {
                item_count: 2,
                total_amount: 2350,
                currency: "USD".to_owned(),
                items: None,
            },
            tracking: TrackingInfo::default(),
            timestamps: BTreeMap::new(),
            meta: DeliveryMeta {
                origin: FetchOrigin::Poll,
                adapter: Platform::Doordash,
                fetched_at: Utc::now(),
                raw: None,
            },
        }
    }

    #[test]
    fn active_until_terminal() {
        let mut delivery = sample();
        assert!(delivery.is_active());
        delivery.status = DeliveryStatus::Delivered;
        assert!(!delivery.is_active());
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("driver").is_none());
        assert!(json.get("fulfilled_by").is_none());
        assert!(json.get("timestamps").is_none());
    }
}
