//! Canonical delivery status vocabulary.
//!
//! Ten values, fixed. Platform-native status strings never leave the
//! normalization boundary in `omnitrack-adapters`; everything downstream
//! sees only this enum.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Preparing,
    ReadyForPickup,
    DriverAssigned,
    DriverHeadingToStore,
    DriverAtStore,
    OutForDelivery,
    Arriving,
    Delivered,
    Cancelled,
    Delayed,
}

impl DeliveryStatus {
    /// Terminal states: the order will receive no further updates.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    /// Rough lifecycle stage index used by ETA heuristics. Higher is closer
    /// to the door. `Delayed` and `Cancelled` have no stage.
    #[must_use]
    pub fn stage(self) -> Option<u8> {
        match self {
            DeliveryStatus::Preparing => Some(0),
            DeliveryStatus::ReadyForPickup => Some(1),
            DeliveryStatus::DriverAssigned => Some(2),
            DeliveryStatus::DriverHeadingToStore => Some(3),
            DeliveryStatus::DriverAtStore => Some(4),
            DeliveryStatus::OutForDelivery => Some(5),
            DeliveryStatus::Arriving => Some(6),
            DeliveryStatus::Delivered => Some(7),
            DeliveryStatus::Cancelled | DeliveryStatus::Delayed => None,
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeliveryStatus::Preparing => "preparing",
            DeliveryStatus::ReadyForPickup => "ready_for_pickup",
            DeliveryStatus::DriverAssigned => "driver_assigned",
            DeliveryStatus::DriverHeadingToStore => "driver_heading_to_store",
            DeliveryStatus::DriverAtStore => "driver_at_store",
            DeliveryStatus::OutForDelivery => "out_for_delivery",
            DeliveryStatus::Arriving => "arriving",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
            DeliveryStatus::Delayed => "delayed",
        };
        f.write_str(s)
    }
}

/// Collapse a raw upstream status string into the lookup key used by every
/// platform status table: lower-cased, with spaces and hyphens folded to
/// single underscores.
#[must_use]
pub fn normalize_status_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut last_was_sep = false;
    for ch in raw.trim().chars() {
        if ch == ' ' || ch == '-' || ch == '_' {
            if !last_was_sep && !key.is_empty() {
                key.push('_');
            }
            last_was_sep = true;
        } else {
            for lower in ch.to_lowercase() {
                key.push(lower);
            }
            last_was_sep = false;
        }
    }
    if key.ends_with('_') {
        key.pop();
    }
    key
}
