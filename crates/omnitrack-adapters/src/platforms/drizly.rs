//! Drizly adapter: OAuth2, alcohol delivery with ID-check gating.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use omnitrack_core::delivery::{
    DeliveryMeta, Destination, DriverInfo, EtaInfo, FetchOrigin, OrderInfo, OrderItem,
    TrackingInfo,
};
use omnitrack_core::webhook::{NormalizedWebhook, WebhookPayload};
use omnitrack_core::{
    derive_delivery_id, mask, timeparse, DeliveryStatus, Platform, UnifiedDelivery,
};
use serde::Deserialize;

use crate::adapter::{AdapterConnection, PlatformAdapter};
use crate::auth::{OAuthClient, OAuthConfig, TokenSet};
use crate::context::AdapterContext;
use crate::error::AdapterError;
use crate::platforms::common::{fetch_json, split_delivery_id};

const DEFAULT_BASE_URL: &str = "https://api.drizly.com";
const PLATFORM: Platform = Platform::Drizly;

pub(crate) fn map_raw_status(raw: &str) -> DeliveryStatus {
    match omnitrack_core::status::normalize_status_key(raw).as_str() {
        "packing" => DeliveryStatus::Preparing,
        "ready" => DeliveryStatus::ReadyForPickup,
        "driver_assigned" => DeliveryStatus::DriverAssigned,
        "out_for_delivery" | "in_transit" => DeliveryStatus::OutForDelivery,
        "arriving" | "id_check_pending" => DeliveryStatus::Arriving,
        "delivered" | "id_verified_delivered" => DeliveryStatus::Delivered,
        "cancelled" | "canceled" | "id_check_failed" => DeliveryStatus::Cancelled,
        "delayed" => DeliveryStatus::Delayed,
        _ => DeliveryStatus::Preparing,
    }
}

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    orders: Vec<RawOrder>,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    order_id: String,
    status: String,
    status_updated_at: Option<serde_json::Value>,
    driver: Option<RawDriver>,
    address: Option<String>,
    eta_minutes: Option<f64>,
    items: Option<Vec<RawItem>>,
    total_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawDriver {
    name: Option<String>,
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    name: String,
    quantity: Option<u32>,
    price_cents: Option<i64>,
}

fn normalize(raw: &RawOrder, origin: FetchOrigin) -> UnifiedDelivery {
    UnifiedDelivery {
        id: derive_delivery_id(PLATFORM, &raw.order_id, None),
        platform: PLATFORM,
        fulfilled_by: None,
        status: map_raw_status(&raw.status),
        status_updated_at: raw
            .status_updated_at
            .as_ref()
            .and_then(timeparse::parse_timestamp)
            .unwrap_or_else(Utc::now),
        driver: raw.driver.as_ref().map(|driver| DriverInfo {
            name: driver.name.as_deref().map(mask::mask_name),
            masked_phone: driver.phone.as_deref().map(mask::mask_phone),
            rating: None,
            vehicle: None,
            location: None,
        }),
        destination: Destination {
            address: raw.address.clone(),
            lat: None,
            lng: None,
            instructions: None,
        },
        eta: EtaInfo {
            estimated_arrival: None,
            minutes_remaining: raw.eta_minutes,
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
                        price: item.price_cents,
                        substituted_with: None,
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
            adapter: PLATFORM,
            fetched_at: Utc::now(),
            raw: None,
        },
    }
}

pub struct DrizlyAdapter {
    ctx: AdapterContext,
    base_url: String,
    oauth: OAuthClient,
}

impl DrizlyAdapter {
    #[must_use]
    pub fn new(ctx: AdapterContext, oauth_config: OAuthConfig) -> Self {
        Self::with_base_url(ctx, oauth_config, DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(ctx: AdapterContext, oauth_config: OAuthConfig, base_url: &str) -> Self {
        let oauth = OAuthClient::new(
            PLATFORM,
            ctx.http.clone(),
            oauth_config,
            ctx.rate_limit_fallback_secs,
        );
        Self {
            ctx,
            base_url: base_url.trim_end_matches('/').to_owned(),
            oauth,
        }
    }
}

#[async_trait]
impl PlatformAdapter for DrizlyAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn get_active_deliveries(
        &self,
        connection: &AdapterConnection,
    ) -> Result<Vec<UnifiedDelivery>, AdapterError> {
        let token = connection.credential.oauth_access_token(PLATFORM)?.to_owned();
        let url = format!("{}/v1/orders?state=open", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "drizly active orders", || {
            self.ctx.http.get(&url).bearer_auth(&token)
        })
        .await?;
        let response: OrdersResponse = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("drizly active orders", &e))?;
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
        let token = connection.credential.oauth_access_token(PLATFORM)?.to_owned();
        let url = format!("{}/v1/orders/{external_id}", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "drizly order detail", || {
            self.ctx.http.get(&url).bearer_auth(&token)
        })
        .await?;
        let raw: RawOrder = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("drizly order detail", &e))?;
        Ok(normalize(&raw, FetchOrigin::Poll))
    }

    fn map_status(&self, raw: &str) -> DeliveryStatus {
        map_raw_status(raw)
    }

    async fn oauth_authorize_url(&self, state: &str) -> Result<String, AdapterError> {
        self.oauth.authorize_url(state, None)
    }

    async fn exchange_code(&self, _state: &str, code: &str) -> Result<TokenSet, AdapterError> {
        self.oauth.exchange_code(code, None).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AdapterError> {
        self.oauth.refresh_token(refresh_token).await
    }

    async fn revoke_token(&self, token: &str) -> Result<(), AdapterError> {
        self.oauth.revoke_token(token).await
    }

    fn normalize_webhook(
        &self,
        payload: &WebhookPayload,
    ) -> Result<NormalizedWebhook, AdapterError> {
        match payload.event_type.as_str() {
            "order.updated" => {
                let raw: RawOrder = serde_json::from_value(payload.data.clone())
                    .map_err(|e| AdapterError::deserialize("drizly webhook order", &e))?;
                Ok(NormalizedWebhook::Full(Box::new(normalize(
                    &raw,
                    FetchOrigin::Webhook,
                ))))
            }
            _ => Ok(NormalizedWebhook::Insufficient),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_check_states_map_sensibly() {
        // An ID check happens at the door; the courier is there.
        assert_eq!(map_raw_status("id_check_pending"), DeliveryStatus::Arriving);
        assert_eq!(map_raw_status("id_verified_delivered"), DeliveryStatus::Delivered);
        assert_eq!(map_raw_status("id_check_failed"), DeliveryStatus::Cancelled);
    }

    #[test]
    fn normalize_keeps_item_prices() {
        let raw: RawOrder = serde_json::from_value(serde_json::json!({
            "order_id": "DZ-9",
            "status": "out_for_delivery",
            "items": [{ "name": "Pinot Noir", "quantity": 2, "price_cents": 2399 }],
            "total_cents": 4798
        }))
        .unwrap();
        let delivery = normalize(&raw, FetchOrigin::Poll);
        assert_eq!(delivery.id, "dz_DZ-9");
        assert_eq!(delivery.order.items.unwrap()[0].price, Some(2399));
    }
}
