//! Shipt adapter: captured-session auth, poll-only grocery tracking.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use omnitrack_core::delivery::{
    DeliveryMeta, Destination, DriverInfo, EtaInfo, FetchOrigin, OrderInfo, OrderItem,
    TrackingInfo,
};
use omnitrack_core::{
    derive_delivery_id, mask, timeparse, DeliveryStatus, Platform, UnifiedDelivery,
};
use serde::Deserialize;

use crate::adapter::{AdapterConnection, PlatformAdapter};
use crate::context::AdapterContext;
use crate::error::AdapterError;
use crate::platforms::common::{fetch_json, split_delivery_id};

const DEFAULT_BASE_URL: &str = "https://api.shipt.com";
const PLATFORM: Platform = Platform::Shipt;

/// Shared with the Sam's Club adapter: Sam's Club delivery runs on Shipt's
/// shopper network and reports the same status vocabulary.
pub(crate) fn map_raw_status(raw: &str) -> DeliveryStatus {
    match omnitrack_core::status::normalize_status_key(raw).as_str() {
        "shopping" | "processing" => DeliveryStatus::Preparing,
        "packed" => DeliveryStatus::ReadyForPickup,
        "claimed" | "shopper_assigned" => DeliveryStatus::DriverAssigned,
        "en_route" | "out_for_delivery" => DeliveryStatus::OutForDelivery,
        "nearby" => DeliveryStatus::Arriving,
        "delivered" => DeliveryStatus::Delivered,
        "cancelled" | "canceled" => DeliveryStatus::Cancelled,
        "late" => DeliveryStatus::Delayed,
        _ => DeliveryStatus::Preparing,
    }
}

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    orders: Vec<RawOrder>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawOrder {
    pub(crate) order_id: String,
    pub(crate) status: String,
    pub(crate) status_updated_at: Option<serde_json::Value>,
    pub(crate) shopper: Option<RawShopper>,
    pub(crate) delivery_address: Option<String>,
    pub(crate) delivery_window_start: Option<serde_json::Value>,
    pub(crate) items: Option<Vec<RawItem>>,
    pub(crate) total_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawShopper {
    pub(crate) name: Option<String>,
    pub(crate) phone: Option<String>,
    pub(crate) rating: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawItem {
    pub(crate) name: String,
    pub(crate) quantity: Option<u32>,
    pub(crate) substitution: Option<String>,
}

/// Normalization shared between Shipt and brands fulfilled by its network.
pub(crate) fn normalize_order(
    raw: &RawOrder,
    platform: Platform,
    fulfilled_by: Option<Platform>,
    origin: FetchOrigin,
) -> UnifiedDelivery {
    UnifiedDelivery {
        id: derive_delivery_id(platform, &raw.order_id, None),
        platform,
        fulfilled_by,
        status: map_raw_status(&raw.status),
        status_updated_at: raw
            .status_updated_at
            .as_ref()
            .and_then(timeparse::parse_timestamp)
            .unwrap_or_else(Utc::now),
        driver: raw.shopper.as_ref().map(|shopper| DriverInfo {
            name: shopper.name.as_deref().map(mask::mask_name),
            masked_phone: shopper.phone.as_deref().map(mask::mask_phone),
            rating: shopper.rating,
            vehicle: None,
            location: None,
        }),
        destination: Destination {
            address: raw.delivery_address.clone(),
            lat: None,
            lng: None,
            instructions: None,
        },
        eta: EtaInfo {
            estimated_arrival: raw
                .delivery_window_start
                .as_ref()
                .and_then(timeparse::parse_timestamp),
            minutes_remaining: None,
            distance_km: None,
            stops_remaining: None,
        },
        order: OrderInfo {
            item_count: raw
                .items
                .as_ref()
                .map(|i| i.len().try_into().unwrap_or(0))
                .unwrap_or(0),
            total_amount: raw.total_cents.unwrap_or(0),
            currency: "USD".to_owned(),
            items: raw.items.as_ref().map(|items| {
                items
                    .iter()
                    .map(|item| OrderItem {
                        name: item.name.clone(),
                        quantity: item.quantity.unwrap_or(1),
                        price: None,
                        substituted_with: item.substitution.clone(),
                    })
                    .collect()
            }),
        },
        tracking: TrackingInfo {
            url: None,
            map_available: false,
            live_updates: false,
            driver_contactable: true,
        },
        timestamps: BTreeMap::new(),
        meta: DeliveryMeta {
            origin,
            adapter: platform,
            fetched_at: Utc::now(),
            raw: None,
        },
    }
}

pub struct ShiptAdapter {
    ctx: AdapterContext,
    base_url: String,
}

impl ShiptAdapter {
    #[must_use]
    pub fn new(ctx: AdapterContext) -> Self {
        Self::with_base_url(ctx, DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(ctx: AdapterContext, base_url: &str) -> Self {
        Self {
            ctx,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl PlatformAdapter for ShiptAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn get_active_deliveries(
        &self,
        connection: &AdapterConnection,
    ) -> Result<Vec<UnifiedDelivery>, AdapterError> {
        let cookies = connection.credential.session_cookies(PLATFORM)?.to_owned();
        let url = format!("{}/v1/member/orders?active=true", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "shipt active orders", || {
            self.ctx
                .http
                .get(&url)
                .header(reqwest::header::COOKIE, &cookies)
        })
        .await?;
        let response: OrdersResponse = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("shipt active orders", &e))?;
        Ok(response
            .orders
            .iter()
            .map(|raw| normalize_order(raw, PLATFORM, None, FetchOrigin::Poll))
            .filter(UnifiedDelivery::is_active)
            .collect())
    }

    async fn get_delivery_details(
        &self,
        connection: &AdapterConnection,
        delivery_id: &str,
    ) -> Result<UnifiedDelivery, AdapterError> {
        let (external_id, _) = split_delivery_id(PLATFORM, delivery_id)?;
        let cookies = connection.credential.session_cookies(PLATFORM)?.to_owned();
        let url = format!("{}/v1/member/orders/{external_id}", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "shipt order detail", || {
            self.ctx
                .http
                .get(&url)
                .header(reqwest::header::COOKIE, &cookies)
        })
        .await?;
        let raw: RawOrder = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("shipt order detail", &e))?;
        Ok(normalize_order(&raw, PLATFORM, None, FetchOrigin::Poll))
    }

    fn map_status(&self, raw: &str) -> DeliveryStatus {
        map_raw_status(raw)
    }
}
