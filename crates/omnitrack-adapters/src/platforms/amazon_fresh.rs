//! Amazon Fresh adapter: signed-request auth, windowed grocery delivery.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use omnitrack_core::delivery::{
    DeliveryMeta, Destination, DriverInfo, DriverLocation, EtaInfo, FetchOrigin, OrderInfo,
    OrderItem, TrackingInfo,
};
use omnitrack_core::webhook::{NormalizedWebhook, WebhookPayload};
use omnitrack_core::{derive_delivery_id, timeparse, DeliveryStatus, Platform, UnifiedDelivery};
use serde::Deserialize;

use crate::adapter::{AdapterConnection, PlatformAdapter};
use crate::auth::SignedRequestAuth;
use crate::context::AdapterContext;
use crate::error::AdapterError;
use crate::platforms::common::{fetch_json, split_delivery_id};

const DEFAULT_BASE_URL: &str = "https://fresh.amazon.com";
const PLATFORM: Platform = Platform::AmazonFresh;

pub(crate) fn map_raw_status(raw: &str) -> DeliveryStatus {
    match omnitrack_core::status::normalize_status_key(raw).as_str() {
        "preparing_order" | "picking" => DeliveryStatus::Preparing,
        "order_ready" => DeliveryStatus::ReadyForPickup,
        "driver_assigned" => DeliveryStatus::DriverAssigned,
        "out_for_delivery" => DeliveryStatus::OutForDelivery,
        "arriving_soon" => DeliveryStatus::Arriving,
        "delivered" => DeliveryStatus::Delivered,
        "cancelled" | "canceled" => DeliveryStatus::Cancelled,
        "delayed" => DeliveryStatus::Delayed,
        _ => DeliveryStatus::Preparing,
    }
}

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    deliveries: Vec<RawDelivery>,
}

#[derive(Debug, Deserialize)]
struct RawDelivery {
    delivery_id: String,
    status: String,
    status_updated_at: Option<serde_json::Value>,
    window_start: Option<serde_json::Value>,
    vehicle_location: Option<RawLocation>,
    address: Option<String>,
    items: Option<Vec<RawItem>>,
    total_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    lat: f64,
    lng: f64,
    updated_at: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    name: String,
    quantity: Option<u32>,
}

fn normalize(raw: &RawDelivery, origin: FetchOrigin) -> UnifiedDelivery {
    UnifiedDelivery {
        id: derive_delivery_id(PLATFORM, &raw.delivery_id, None),
        platform: PLATFORM,
        fulfilled_by: None,
        status: map_raw_status(&raw.status),
        status_updated_at: raw
            .status_updated_at
            .as_ref()
            .and_then(timeparse::parse_timestamp)
            .unwrap_or_else(Utc::now),
        driver: raw.vehicle_location.as_ref().map(|loc| DriverInfo {
            name: None,
            masked_phone: None,
            rating: None,
            vehicle: Some("delivery van".to_owned()),
            location: Some(DriverLocation {
                lat: loc.lat,
                lng: loc.lng,
                heading: None,
                speed: None,
                updated_at: loc
                    .updated_at
                    .as_ref()
                    .and_then(timeparse::parse_timestamp)
                    .unwrap_or_else(Utc::now),
            }),
        }),
        destination: Destination {
            address: raw.address.clone(),
            lat: None,
            lng: None,
            instructions: None,
        },
        eta: EtaInfo {
            estimated_arrival: raw.window_start.as_ref().and_then(timeparse::parse_timestamp),
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
                        substituted_with: None,
                    })
                    .collect()
            }),
        },
        tracking: TrackingInfo {
            url: None,
            map_available: raw.vehicle_location.is_some(),
            live_updates: true,
            driver_contactable: false,
        },
        timestamps: BTreeMap::new(),
        meta: DeliveryMeta {
            origin,
            adapter: PLATFORM,
            fetched_at: Utc::now(),
            raw: None,
        },
    }
}

pub struct AmazonFreshAdapter {
    ctx: AdapterContext,
    base_url: String,
    auth: SignedRequestAuth,
}

impl AmazonFreshAdapter {
    #[must_use]
    pub fn new(ctx: AdapterContext) -> Self {
        Self::with_base_url(ctx, DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(ctx: AdapterContext, base_url: &str) -> Self {
        let auth = SignedRequestAuth::new(PLATFORM, ctx.ttl_store.clone());
        Self {
            ctx,
            base_url: base_url.trim_end_matches('/').to_owned(),
            auth,
        }
    }

    async fn fetch(
        &self,
        connection: &AdapterConnection,
        url: &str,
        label: &str,
    ) -> Result<serde_json::Value, AdapterError> {
        let (key_id, secret) = connection.credential.signing_key(PLATFORM)?;
        let token = self.auth.bearer_token(key_id, secret).await?;
        let result = fetch_json(&self.ctx, PLATFORM, label, || {
            self.ctx.http.get(url).bearer_auth(&token)
        })
        .await;
        if let Err(AdapterError::Auth { .. }) = &result {
            self.auth.invalidate(key_id).await;
        }
        result
    }
}

#[async_trait]
impl PlatformAdapter for AmazonFreshAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn get_active_deliveries(
        &self,
        connection: &AdapterConnection,
    ) -> Result<Vec<UnifiedDelivery>, AdapterError> {
        let url = format!("{}/v1/deliveries?state=upcoming", self.base_url);
        let body = self
            .fetch(connection, &url, "amazon fresh deliveries")
            .await?;
        let response: OrdersResponse = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("amazon fresh deliveries", &e))?;
        Ok(response
            .deliveries
            .iter()
            .map(|raw| normalize(raw, FetchOrigin::Poll))
            .filter(UnifiedDelivery::is_active)
            .collect())
    }

    async fn get_delivery_details(
        &self,
        connection: &AdapterConnection,
        delivery_id: &str,
    ) -> Result<UnifiedDelivery, AdapterError> {
        let (external_id, _) = split_delivery_id(PLATFORM, delivery_id)?;
        let url = format!("{}/v1/deliveries/{external_id}", self.base_url);
        let body = self
            .fetch(connection, &url, "amazon fresh delivery detail")
            .await?;
        let raw: RawDelivery = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("amazon fresh delivery detail", &e))?;
        Ok(normalize(&raw, FetchOrigin::Poll))
    }

    fn map_status(&self, raw: &str) -> DeliveryStatus {
        map_raw_status(raw)
    }

    fn normalize_webhook(
        &self,
        payload: &WebhookPayload,
    ) -> Result<NormalizedWebhook, AdapterError> {
        match payload.event_type.as_str() {
            "delivery.updated" => {
                let raw: RawDelivery = serde_json::from_value(payload.data.clone())
                    .map_err(|e| AdapterError::deserialize("amazon fresh webhook", &e))?;
                Ok(NormalizedWebhook::Full(Box::new(normalize(
                    &raw,
                    FetchOrigin::Webhook,
                ))))
            }
            _ => Ok(NormalizedWebhook::Insufficient),
        }
    }
}
