//! Uber Eats adapter: plain OAuth2 (no PKCE), webhook push, courier GPS.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use omnitrack_core::delivery::{
    DeliveryMeta, Destination, DriverInfo, DriverLocation, EtaInfo, FetchOrigin, OrderInfo,
    OrderItem, TrackingInfo,
};
use omnitrack_core::webhook::{DeliveryDelta, NormalizedWebhook, WebhookPayload};
use omnitrack_core::{
    derive_delivery_id, mask, timeparse, DeliveryStatus, Platform, UnifiedDelivery,
};
use serde::Deserialize;

use crate::adapter::{AdapterConnection, PlatformAdapter};
use crate::auth::{OAuthClient, OAuthConfig, TokenSet};
use crate::context::AdapterContext;
use crate::error::AdapterError;
use crate::platforms::common::{fetch_json, split_delivery_id};

const DEFAULT_BASE_URL: &str = "https://api.uber.com";
const PLATFORM: Platform = Platform::UberEats;

pub(crate) fn map_raw_status(raw: &str) -> DeliveryStatus {
    match omnitrack_core::status::normalize_status_key(raw).as_str() {
        "order_ready" => DeliveryStatus::ReadyForPickup,
        "courier_assigned" | "courier_accepted" => DeliveryStatus::DriverAssigned,
        "courier_en_route_to_restaurant" => DeliveryStatus::DriverHeadingToStore,
        "courier_arrived_at_restaurant" => DeliveryStatus::DriverAtStore,
        "order_picked_up" | "en_route_to_dropoff" => DeliveryStatus::OutForDelivery,
        "courier_nearby" => DeliveryStatus::Arriving,
        "order_delivered" | "completed" => DeliveryStatus::Delivered,
        "order_cancelled" | "order_canceled" => DeliveryStatus::Cancelled,
        "order_delayed" => DeliveryStatus::Delayed,
        _ => DeliveryStatus::Preparing,
    }
}

#[derive(Debug, Deserialize)]
struct OrdersEnvelope {
    data: Vec<RawOrder>,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    order_id: String,
    current_state: String,
    state_changed_at: Option<serde_json::Value>,
    courier: Option<RawCourier>,
    dropoff: Option<RawDropoff>,
    estimated_arrival_time: Option<serde_json::Value>,
    cart: Option<RawCart>,
    tracking_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCourier {
    name: Option<String>,
    phone: Option<String>,
    rating: Option<f32>,
    vehicle: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    bearing: Option<f64>,
    location_updated_at: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawDropoff {
    address: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCart {
    items: Vec<RawItem>,
    total_cents: Option<i64>,
    currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    title: String,
    quantity: Option<u32>,
    price_cents: Option<i64>,
}

pub struct UberEatsAdapter {
    ctx: AdapterContext,
    base_url: String,
    oauth: OAuthClient,
}

impl UberEatsAdapter {
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

    fn normalize(raw: &RawOrder, origin: FetchOrigin) -> UnifiedDelivery {
        let driver = raw.courier.as_ref().map(|courier| DriverInfo {
            name: courier.name.as_deref().map(mask::mask_name),
            masked_phone: courier.phone.as_deref().map(mask::mask_phone),
            rating: courier.rating,
            vehicle: courier.vehicle.clone(),
            location: match (courier.latitude, courier.longitude) {
                (Some(lat), Some(lng)) => Some(DriverLocation {
                    lat,
                    lng,
                    heading: courier.bearing,
                    speed: None,
                    updated_at: courier
                        .location_updated_at
                        .as_ref()
                        .and_then(timeparse::parse_timestamp)
                        .unwrap_or_else(Utc::now),
                }),
                _ => None,
            },
        });

        UnifiedDelivery {
            id: derive_delivery_id(PLATFORM, &raw.order_id, None),
            platform: PLATFORM,
            fulfilled_by: None,
            status: map_raw_status(&raw.current_state),
            status_updated_at: raw
                .state_changed_at
                .as_ref()
                .and_then(timeparse::parse_timestamp)
                .unwrap_or_else(Utc::now),
            driver,
            destination: Destination {
                address: raw.dropoff.as_ref().and_then(|d| d.address.clone()),
                lat: raw.dropoff.as_ref().and_then(|d| d.latitude),
                lng: raw.dropoff.as_ref().and_then(|d| d.longitude),
                instructions: raw.dropoff.as_ref().and_then(|d| d.notes.clone()),
            },
            eta: EtaInfo {
                estimated_arrival: raw
                    .estimated_arrival_time
                    .as_ref()
                    .and_then(timeparse::parse_timestamp),
                minutes_remaining: None,
                distance_km: None,
                stops_remaining: None,
            },
            order: raw.cart.as_ref().map_or_else(
                || OrderInfo {
                    item_count: 0,
                    total_amount: 0,
                    currency: "USD".to_owned(),
                    items: None,
                },
                |cart| OrderInfo {
                    item_count: cart.items.len().try_into().unwrap_or(0),
                    total_amount: cart.total_cents.unwrap_or(0),
                    currency: cart.currency_code.clone().unwrap_or_else(|| "USD".to_owned()),
                    items: Some(
                        cart.items
                            .iter()
                            .map(|item| OrderItem {
                                name: item.title.clone(),
                                quantity: item.quantity.unwrap_or(1),
                                price: item.price_cents,
                                substituted_with: None,
                            })
                            .collect(),
                    ),
                },
            ),
            tracking: TrackingInfo {
                url: raw.tracking_url.clone(),
                map_available: true,
                live_updates: true,
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
}

#[async_trait]
impl PlatformAdapter for UberEatsAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn get_active_deliveries(
        &self,
        connection: &AdapterConnection,
    ) -> Result<Vec<UnifiedDelivery>, AdapterError> {
        let token = connection.credential.oauth_access_token(PLATFORM)?.to_owned();
        let url = format!("{}/v1/eats/orders?state=active", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "uber eats active orders", || {
            self.ctx.http.get(&url).bearer_auth(&token)
        })
        .await?;
        let envelope: OrdersEnvelope = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("uber eats active orders", &e))?;
        Ok(envelope
            .data
            .iter()
            .map(|raw| Self::normalize(raw, FetchOrigin::Poll))
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
        let url = format!("{}/v1/eats/orders/{external_id}", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "uber eats order detail", || {
            self.ctx.http.get(&url).bearer_auth(&token)
        })
        .await?;
        let raw: RawOrder = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("uber eats order detail", &e))?;
        Ok(Self::normalize(&raw, FetchOrigin::Poll))
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
            "orders.status_update" => {
                let raw: RawOrder = serde_json::from_value(payload.data.clone())
                    .map_err(|e| AdapterError::deserialize("uber eats webhook order", &e))?;
                Ok(NormalizedWebhook::Full(Box::new(Self::normalize(
                    &raw,
                    FetchOrigin::Webhook,
                ))))
            }
            "couriers.location_update" => {
                let Some(order_id) = payload.data.get("order_id").and_then(|v| v.as_str()) else {
                    return Ok(NormalizedWebhook::Insufficient);
                };
                let lat = payload.data.get("latitude").and_then(serde_json::Value::as_f64);
                let lng = payload.data.get("longitude").and_then(serde_json::Value::as_f64);
                let (Some(lat), Some(lng)) = (lat, lng) else {
                    return Ok(NormalizedWebhook::Insufficient);
                };
                Ok(NormalizedWebhook::Partial(DeliveryDelta {
                    delivery_id: derive_delivery_id(PLATFORM, order_id, None),
                    status: None,
                    location: Some(DriverLocation {
                        lat,
                        lng,
                        heading: payload.data.get("bearing").and_then(serde_json::Value::as_f64),
                        speed: None,
                        updated_at: payload.timestamp,
                    }),
                    minutes_remaining: None,
                    updated_at: payload.timestamp,
                }))
            }
            _ => Ok(NormalizedWebhook::Insufficient),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_courier_states() {
        assert_eq!(
            map_raw_status("courier_en_route_to_restaurant"),
            DeliveryStatus::DriverHeadingToStore
        );
        assert_eq!(map_raw_status("Courier Nearby"), DeliveryStatus::Arriving);
        assert_eq!(map_raw_status("made_up_state"), DeliveryStatus::Preparing);
    }

    #[test]
    fn normalize_reads_estimated_arrival() {
        let raw: RawOrder = serde_json::from_value(serde_json::json!({
            "order_id": "ab-12",
            "current_state": "en_route_to_dropoff",
            "estimated_arrival_time": "2026-08-29T12:30:00Z",
            "cart": { "items": [{"title": "Pad Thai"}], "total_cents": 1899 }
        }))
        .unwrap();
        let delivery = UberEatsAdapter::normalize(&raw, FetchOrigin::Poll);
        assert_eq!(delivery.id, "ue_ab-12");
        assert!(delivery.eta.estimated_arrival.is_some());
        assert_eq!(delivery.order.item_count, 1);
        assert_eq!(delivery.order.total_amount, 1899);
    }

    fn test_adapter() -> UberEatsAdapter {
        UberEatsAdapter::new(
            crate::context::AdapterContext::for_tests(),
            OAuthConfig {
                client_id: "id".to_owned(),
                client_secret: "secret".to_owned(),
                authorize_url: "https://auth.uber.com/oauth/v2/authorize".to_owned(),
                token_url: "https://auth.uber.com/oauth/v2/token".to_owned(),
                redirect_uri: "https://app.example.com/callback".to_owned(),
                scopes: vec!["eats.order".to_owned()],
            },
        )
    }

    #[test]
    fn location_webhook_becomes_partial_delta() {
        let payload = WebhookPayload {
            platform: PLATFORM,
            event_type: "couriers.location_update".to_owned(),
            event_id: "evt-1".to_owned(),
            timestamp: Utc::now(),
            data: serde_json::json!({
                "order_id": "ab-12",
                "latitude": 34.02,
                "longitude": -81.05,
                "bearing": 270.0
            }),
            signature: None,
        };
        let normalized = test_adapter().normalize_webhook(&payload).unwrap();
        let NormalizedWebhook::Partial(delta) = normalized else {
            panic!("expected a partial delta");
        };
        assert_eq!(delta.delivery_id, "ue_ab-12");
        let location = delta.location.unwrap();
        assert!((location.lat - 34.02).abs() < 1e-9);
        assert_eq!(location.heading, Some(270.0));
    }

    #[test]
    fn unknown_webhook_event_is_insufficient() {
        let payload = WebhookPayload {
            platform: PLATFORM,
            event_type: "promotions.new".to_owned(),
            event_id: "evt-2".to_owned(),
            timestamp: Utc::now(),
            data: serde_json::json!({}),
            signature: None,
        };
        assert!(matches!(
            test_adapter().normalize_webhook(&payload).unwrap(),
            NormalizedWebhook::Insufficient
        ));
    }
}
