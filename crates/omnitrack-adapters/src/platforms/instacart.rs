//! Instacart adapter: OAuth2 + PKCE, grocery orders with substitutions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use omnitrack_core::delivery::{
    DeliveryMeta, Destination, DriverInfo, DriverLocation, EtaInfo, FetchOrigin, OrderInfo,
    OrderItem, TrackingInfo,
};
use omnitrack_core::webhook::{NormalizedWebhook, WebhookPayload};
use omnitrack_core::{
    derive_delivery_id, mask, timeparse, DeliveryStatus, Platform, UnifiedDelivery,
};
use serde::Deserialize;

use crate::adapter::{AdapterConnection, PlatformAdapter};
use crate::auth::{OAuthClient, OAuthConfig, PkceChallenge, PkceVerifiers, TokenSet};
use crate::context::AdapterContext;
use crate::error::AdapterError;
use crate::platforms::common::{fetch_json, split_delivery_id};

const DEFAULT_BASE_URL: &str = "https://api.instacart.com";
const PLATFORM: Platform = Platform::Instacart;

/// Shared with the Costco adapter: Costco's grocery fulfilment runs on
/// Instacart's shopper network and reports the same status vocabulary.
pub(crate) fn map_raw_status(raw: &str) -> DeliveryStatus {
    match omnitrack_core::status::normalize_status_key(raw).as_str() {
        "shopping" | "picking" => DeliveryStatus::Preparing,
        "checkout_complete" | "bagged" => DeliveryStatus::ReadyForPickup,
        "shopper_assigned" => DeliveryStatus::DriverAssigned,
        "heading_to_store" => DeliveryStatus::DriverHeadingToStore,
        "at_store" => DeliveryStatus::DriverAtStore,
        "on_the_way" | "delivering" => DeliveryStatus::OutForDelivery,
        "arriving_soon" => DeliveryStatus::Arriving,
        "delivered" => DeliveryStatus::Delivered,
        "cancelled" | "canceled" => DeliveryStatus::Cancelled,
        "delayed" => DeliveryStatus::Delayed,
        _ => DeliveryStatus::Preparing,
    }
}

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    orders: Vec<RawOrder>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawOrder {
    pub(crate) id: String,
    pub(crate) workflow_state: String,
    pub(crate) state_changed_at: Option<serde_json::Value>,
    pub(crate) shopper: Option<RawShopper>,
    pub(crate) address: Option<RawAddress>,
    pub(crate) delivery_eta: Option<RawEta>,
    pub(crate) items: Option<Vec<RawItem>>,
    pub(crate) total_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawShopper {
    pub(crate) name: Option<String>,
    pub(crate) phone: Option<String>,
    pub(crate) rating: Option<f32>,
    pub(crate) location: Option<RawLocation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLocation {
    pub(crate) lat: f64,
    pub(crate) lng: f64,
    pub(crate) updated_at: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAddress {
    pub(crate) line1: Option<String>,
    pub(crate) lat: Option<f64>,
    pub(crate) lng: Option<f64>,
    pub(crate) instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEta {
    pub(crate) minutes: Option<f64>,
    pub(crate) window_start: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawItem {
    pub(crate) name: String,
    pub(crate) quantity: Option<u32>,
    pub(crate) price_cents: Option<i64>,
    pub(crate) replaced_with: Option<String>,
}

/// Normalization shared between Instacart itself and brands fulfilled by
/// its shopper network. `platform` is the brand; `fulfilled_by` marks the
/// courier network when they differ.
pub(crate) fn normalize_order(
    raw: &RawOrder,
    platform: Platform,
    fulfilled_by: Option<Platform>,
    origin: FetchOrigin,
) -> UnifiedDelivery {
    let driver = raw.shopper.as_ref().map(|shopper| DriverInfo {
        name: shopper.name.as_deref().map(mask::mask_name),
        masked_phone: shopper.phone.as_deref().map(mask::mask_phone),
        rating: shopper.rating,
        vehicle: None,
        location: shopper.location.as_ref().map(|loc| DriverLocation {
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
    });

    UnifiedDelivery {
        id: derive_delivery_id(platform, &raw.id, None),
        platform,
        fulfilled_by,
        status: map_raw_status(&raw.workflow_state),
        status_updated_at: raw
            .state_changed_at
            .as_ref()
            .and_then(timeparse::parse_timestamp)
            .unwrap_or_else(Utc::now),
        driver,
        destination: Destination {
            address: raw.address.as_ref().and_then(|a| a.line1.clone()),
            lat: raw.address.as_ref().and_then(|a| a.lat),
            lng: raw.address.as_ref().and_then(|a| a.lng),
            instructions: raw.address.as_ref().and_then(|a| a.instructions.clone()),
        },
        eta: EtaInfo {
            estimated_arrival: raw
                .delivery_eta
                .as_ref()
                .and_then(|e| e.window_start.as_ref())
                .and_then(timeparse::parse_timestamp),
            minutes_remaining: raw.delivery_eta.as_ref().and_then(|e| e.minutes),
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
                        substituted_with: item.replaced_with.clone(),
                    })
                    .collect()
            }),
        },
        tracking: TrackingInfo {
            url: None,
            map_available: true,
            live_updates: true,
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

pub struct InstacartAdapter {
    ctx: AdapterContext,
    base_url: String,
    oauth: OAuthClient,
    pkce: PkceVerifiers,
}

impl InstacartAdapter {
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
        let pkce = PkceVerifiers::new(
            ctx.ttl_store.clone(),
            std::time::Duration::from_secs(ctx.pkce_ttl_secs),
        );
        Self {
            ctx,
            base_url: base_url.trim_end_matches('/').to_owned(),
            oauth,
            pkce,
        }
    }
}

#[async_trait]
impl PlatformAdapter for InstacartAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn get_active_deliveries(
        &self,
        connection: &AdapterConnection,
    ) -> Result<Vec<UnifiedDelivery>, AdapterError> {
        let token = connection.credential.oauth_access_token(PLATFORM)?.to_owned();
        let url = format!("{}/v2/orders?state=active", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "instacart active orders", || {
            self.ctx.http.get(&url).bearer_auth(&token)
        })
        .await?;
        let response: OrdersResponse = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("instacart active orders", &e))?;
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
        let token = connection.credential.oauth_access_token(PLATFORM)?.to_owned();
        let url = format!("{}/v2/orders/{external_id}", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "instacart order detail", || {
            self.ctx.http.get(&url).bearer_auth(&token)
        })
        .await?;
        let raw: RawOrder = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("instacart order detail", &e))?;
        Ok(normalize_order(&raw, PLATFORM, None, FetchOrigin::Poll))
    }

    fn map_status(&self, raw: &str) -> DeliveryStatus {
        map_raw_status(raw)
    }

    async fn oauth_authorize_url(&self, state: &str) -> Result<String, AdapterError> {
        let challenge = PkceChallenge::generate();
        self.pkce.put(state, &challenge.verifier).await;
        self.oauth.authorize_url(state, Some(&challenge.challenge))
    }

    async fn exchange_code(&self, state: &str, code: &str) -> Result<TokenSet, AdapterError> {
        let verifier = self.pkce.take(state).await.ok_or_else(|| AdapterError::Auth {
            platform: PLATFORM,
            reason: "unknown or expired PKCE state".to_owned(),
        })?;
        self.oauth.exchange_code(code, Some(&verifier)).await
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
            "order.state_changed" => {
                let Some(order) = payload.data.get("order") else {
                    return Ok(NormalizedWebhook::Insufficient);
                };
                let raw: RawOrder = serde_json::from_value(order.clone())
                    .map_err(|e| AdapterError::deserialize("instacart webhook order", &e))?;
                Ok(NormalizedWebhook::Full(Box::new(normalize_order(
                    &raw,
                    PLATFORM,
                    None,
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
    fn shopping_states_map_to_preparing() {
        assert_eq!(map_raw_status("shopping"), DeliveryStatus::Preparing);
        assert_eq!(map_raw_status("picking"), DeliveryStatus::Preparing);
        assert_eq!(map_raw_status("On The Way"), DeliveryStatus::OutForDelivery);
    }

    #[test]
    fn normalize_carries_substitutions() {
        let raw: RawOrder = serde_json::from_value(serde_json::json!({
            "id": "315",
            "workflow_state": "delivering",
            "items": [
                { "name": "Whole Milk", "quantity": 1, "replaced_with": "2% Milk" },
                { "name": "Eggs", "quantity": 2 }
            ],
            "total_cents": 3150
        }))
        .unwrap();
        let delivery = normalize_order(&raw, PLATFORM, None, FetchOrigin::Poll);
        let items = delivery.order.items.unwrap();
        assert_eq!(items[0].substituted_with.as_deref(), Some("2% Milk"));
        assert!(items[1].substituted_with.is_none());
        assert_eq!(delivery.id, "ic_315");
        assert!(delivery.fulfilled_by.is_none());
    }

    #[test]
    fn normalize_marks_foreign_fulfilment() {
        let raw: RawOrder = serde_json::from_value(serde_json::json!({
            "id": "900",
            "workflow_state": "shopper_assigned"
        }))
        .unwrap();
        let delivery = normalize_order(
            &raw,
            Platform::Costco,
            Some(Platform::Instacart),
            FetchOrigin::Poll,
        );
        assert_eq!(delivery.id, "cc_900");
        assert_eq!(delivery.platform, Platform::Costco);
        assert_eq!(delivery.fulfilled_by, Some(Platform::Instacart));
    }
}
