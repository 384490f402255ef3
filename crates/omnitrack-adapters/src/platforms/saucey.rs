//! Saucey adapter: signed-request auth, minimal poll-only surface.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use omnitrack_core::delivery::{
    DeliveryMeta, Destination, EtaInfo, FetchOrigin, OrderInfo, OrderItem, TrackingInfo,
};
use omnitrack_core::{derive_delivery_id, timeparse, DeliveryStatus, Platform, UnifiedDelivery};
use serde::Deserialize;

use crate::adapter::{AdapterConnection, PlatformAdapter};
use crate::auth::SignedRequestAuth;
use crate::context::AdapterContext;
use crate::error::AdapterError;
use crate::platforms::common::{fetch_json, split_delivery_id};

const DEFAULT_BASE_URL: &str = "https://api.saucey.com";
const PLATFORM: Platform = Platform::Saucey;

pub(crate) fn map_raw_status(raw: &str) -> DeliveryStatus {
    match omnitrack_core::status::normalize_status_key(raw).as_str() {
        "confirmed" | "packing" => DeliveryStatus::Preparing,
        "ready" => DeliveryStatus::ReadyForPickup,
        "courier_assigned" => DeliveryStatus::DriverAssigned,
        "out_for_delivery" => DeliveryStatus::OutForDelivery,
        "delivered" => DeliveryStatus::Delivered,
        "cancelled" | "canceled" => DeliveryStatus::Cancelled,
        _ => DeliveryStatus::Preparing,
    }
}

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    orders: Vec<RawOrder>,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    id: String,
    status: String,
    updated_at: Option<serde_json::Value>,
    address: Option<String>,
    items: Option<Vec<RawItem>>,
    total_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    name: String,
    quantity: Option<u32>,
}

fn normalize(raw: &RawOrder, origin: FetchOrigin) -> UnifiedDelivery {
    UnifiedDelivery {
        id: derive_delivery_id(PLATFORM, &raw.id, None),
        platform: PLATFORM,
        fulfilled_by: None,
        status: map_raw_status(&raw.status),
        status_updated_at: raw
            .updated_at
            .as_ref()
            .and_then(timeparse::parse_timestamp)
            .unwrap_or_else(Utc::now),
        driver: None,
        destination: Destination {
            address: raw.address.clone(),
            lat: None,
            lng: None,
            instructions: None,
        },
        eta: EtaInfo::default(),
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
        tracking: TrackingInfo::default(),
        timestamps: BTreeMap::new(),
        meta: DeliveryMeta {
            origin,
            adapter: PLATFORM,
            fetched_at: Utc::now(),
            raw: None,
        },
    }
}

pub struct SauceyAdapter {
    ctx: AdapterContext,
    base_url: String,
    auth: SignedRequestAuth,
}

impl SauceyAdapter {
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
impl PlatformAdapter for SauceyAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn get_active_deliveries(
        &self,
        connection: &AdapterConnection,
    ) -> Result<Vec<UnifiedDelivery>, AdapterError> {
        let url = format!("{}/v1/orders?status=open", self.base_url);
        let body = self.fetch(connection, &url, "saucey active orders").await?;
        let response: OrdersResponse = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("saucey active orders", &e))?;
        Ok(response
            .orders
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
        let url = format!("{}/v1/orders/{external_id}", self.base_url);
        let body = self.fetch(connection, &url, "saucey order detail").await?;
        let raw: RawOrder = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("saucey order detail", &e))?;
        Ok(normalize(&raw, FetchOrigin::Poll))
    }

    fn map_status(&self, raw: &str) -> DeliveryStatus {
        map_raw_status(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_vocabulary_maps() {
        assert_eq!(map_raw_status("courier_assigned"), DeliveryStatus::DriverAssigned);
        assert_eq!(map_raw_status("anything"), DeliveryStatus::Preparing);
    }

    #[test]
    fn normalize_without_driver_or_eta() {
        let raw: RawOrder = serde_json::from_value(serde_json::json!({
            "id": "S-4",
            "status": "out_for_delivery",
            "total_cents": 5300
        }))
        .unwrap();
        let delivery = normalize(&raw, FetchOrigin::Poll);
        assert_eq!(delivery.id, "sy_S-4");
        assert!(delivery.driver.is_none());
        assert!(delivery.eta.minutes_remaining.is_none());
    }
}
