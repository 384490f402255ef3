//! DoorDash adapter: OAuth2 + PKCE, webhook push, live dasher location.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use omnitrack_core::delivery::{
    DeliveryMeta, Destination, DriverInfo, DriverLocation, EtaInfo, FetchOrigin, LifecycleEvent,
    OrderInfo, OrderItem, TrackingInfo,
};
use omnitrack_core::webhook::{DeliveryDelta, NormalizedWebhook, WebhookPayload};
use omnitrack_core::{
    derive_delivery_id, mask, timeparse, DeliveryStatus, Platform, UnifiedDelivery,
};
use serde::Deserialize;

use crate::adapter::{AdapterConnection, PlatformAdapter};
use crate::auth::{OAuthClient, OAuthConfig, PkceChallenge, PkceVerifiers, TokenSet};
use crate::context::AdapterContext;
use crate::error::AdapterError;
use crate::platforms::common::{fetch_json, split_delivery_id};

const DEFAULT_BASE_URL: &str = "https://api.doordash.com";
const PLATFORM: Platform = Platform::Doordash;

/// Raw status vocabulary → canonical. Total: unmapped keys fall open to
/// `Preparing` so an unknown upstream state never reads as terminal.
pub(crate) fn map_raw_status(raw: &str) -> DeliveryStatus {
    match omnitrack_core::status::normalize_status_key(raw).as_str() {
        "ready_for_pickup" => DeliveryStatus::ReadyForPickup,
        "dasher_assigned" | "dasher_confirmed" => DeliveryStatus::DriverAssigned,
        "dasher_heading_to_store" | "enroute_to_pickup" => DeliveryStatus::DriverHeadingToStore,
        "dasher_at_store" | "arrived_at_store" => DeliveryStatus::DriverAtStore,
        "picked_up" | "enroute_to_dropoff" | "out_for_delivery" => DeliveryStatus::OutForDelivery,
        "arriving" | "dasher_arriving" => DeliveryStatus::Arriving,
        "delivered" | "dropped_off" => DeliveryStatus::Delivered,
        "cancelled" | "canceled" => DeliveryStatus::Cancelled,
        "delayed" => DeliveryStatus::Delayed,
        // "order_placed", "kitchen_preparing", and anything unrecognised.
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
    status_updated_at: Option<serde_json::Value>,
    dasher: Option<RawDasher>,
    delivery_address: Option<RawAddress>,
    quoted_delivery_minutes: Option<f64>,
    item_count: Option<u32>,
    subtotal_cents: Option<i64>,
    currency: Option<String>,
    items: Option<Vec<RawItem>>,
    tracking_url: Option<String>,
    #[serde(default)]
    timeline: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawDasher {
    first_name: Option<String>,
    last_name: Option<String>,
    phone_number: Option<String>,
    rating: Option<f32>,
    vehicle_type: Option<String>,
    location: Option<RawLocation>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    lat: f64,
    lng: f64,
    heading: Option<f64>,
    speed_mps: Option<f64>,
    reported_at: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    formatted: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    dropoff_instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    name: String,
    quantity: Option<u32>,
    price_cents: Option<i64>,
}

pub struct DoordashAdapter {
    ctx: AdapterContext,
    base_url: String,
    oauth: OAuthClient,
    pkce: PkceVerifiers,
}

impl DoordashAdapter {
    #[must_use]
    pub fn new(ctx: AdapterContext, oauth_config: OAuthConfig) -> Self {
        Self::with_base_url(ctx, oauth_config, DEFAULT_BASE_URL)
    }

    /// Custom base URL for tests against a mock server.
    #[must_use]
    pub fn with_base_url(
        ctx: AdapterContext,
        oauth_config: OAuthConfig,
        base_url: &str,
    ) -> Self {
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

    fn normalize(raw: &RawOrder, origin: FetchOrigin) -> UnifiedDelivery {
        let status = map_raw_status(&raw.status);
        let status_updated_at = raw
            .status_updated_at
            .as_ref()
            .and_then(timeparse::parse_timestamp)
            .unwrap_or_else(Utc::now);

        let driver = raw.dasher.as_ref().map(|dasher| {
            let full_name = match (&dasher.first_name, &dasher.last_name) {
                (Some(first), Some(last)) => Some(format!("{first} {last}")),
                (Some(first), None) => Some(first.clone()),
                _ => None,
            };
            DriverInfo {
                name: full_name.as_deref().map(mask::mask_name),
                masked_phone: dasher.phone_number.as_deref().map(mask::mask_phone),
                rating: dasher.rating,
                vehicle: dasher.vehicle_type.clone(),
                location: dasher.location.as_ref().map(|loc| DriverLocation {
                    lat: loc.lat,
                    lng: loc.lng,
                    heading: loc.heading,
                    speed: loc.speed_mps,
                    updated_at: loc
                        .reported_at
                        .as_ref()
                        .and_then(timeparse::parse_timestamp)
                        .unwrap_or_else(Utc::now),
                }),
            }
        });

        let mut timestamps = BTreeMap::new();
        for (key, value) in &raw.timeline {
            let Some(instant) = timeparse::parse_timestamp(value) else {
                continue;
            };
            let event = match key.as_str() {
                "placed" => LifecycleEvent::Ordered,
                "confirmed" => LifecycleEvent::Confirmed,
                "preparing" => LifecycleEvent::Preparing,
                "ready" => LifecycleEvent::Ready,
                "dasher_assigned" => LifecycleEvent::DriverAssigned,
                "picked_up" => LifecycleEvent::PickedUp,
                "out_for_delivery" => LifecycleEvent::OutForDelivery,
                "arriving" => LifecycleEvent::Arriving,
                "delivered" => LifecycleEvent::Delivered,
                "cancelled" => LifecycleEvent::Cancelled,
                _ => continue,
            };
            timestamps.insert(event, instant);
        }

        UnifiedDelivery {
            id: derive_delivery_id(PLATFORM, &raw.id, None),
            platform: PLATFORM,
            fulfilled_by: None,
            status,
            status_updated_at,
            driver,
            destination: Destination {
                address: raw
                    .delivery_address
                    .as_ref()
                    .and_then(|a| a.formatted.clone()),
                lat: raw.delivery_address.as_ref().and_then(|a| a.lat),
                lng: raw.delivery_address.as_ref().and_then(|a| a.lng),
                instructions: raw
                    .delivery_address
                    .as_ref()
                    .and_then(|a| a.dropoff_instructions.clone()),
            },
            eta: EtaInfo {
                estimated_arrival: None,
                minutes_remaining: raw.quoted_delivery_minutes,
                distance_km: None,
                stops_remaining: None,
            },
            order: OrderInfo {
                item_count: raw
                    .item_count
                    .or_else(|| raw.items.as_ref().map(|i| i.len().try_into().unwrap_or(0)))
                    .unwrap_or(0),
                total_amount: raw.subtotal_cents.unwrap_or(0),
                currency: raw.currency.clone().unwrap_or_else(|| "USD".to_owned()),
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
                url: raw.tracking_url.clone(),
                map_available: true,
                live_updates: true,
                driver_contactable: true,
            },
            timestamps,
            meta: DeliveryMeta {
                origin,
                adapter: PLATFORM,
                fetched_at: Utc::now(),
                raw: None,
            },
        }
    }

    async fn bearer(&self, connection: &AdapterConnection) -> Result<String, AdapterError> {
        Ok(connection
            .credential
            .oauth_access_token(PLATFORM)?
            .to_owned())
    }
}

#[async_trait]
impl PlatformAdapter for DoordashAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn get_active_deliveries(
        &self,
        connection: &AdapterConnection,
    ) -> Result<Vec<UnifiedDelivery>, AdapterError> {
        let token = self.bearer(connection).await?;
        let url = format!("{}/v1/orders/active", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "doordash active orders", || {
            self.ctx.http.get(&url).bearer_auth(&token)
        })
        .await?;
        let response: OrdersResponse = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("doordash active orders", &e))?;
        Ok(response
            .orders
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
        let token = self.bearer(connection).await?;
        let url = format!("{}/v1/orders/{external_id}", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "doordash order detail", || {
            self.ctx.http.get(&url).bearer_auth(&token)
        })
        .await?;
        let raw: RawOrder = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("doordash order detail", &e))?;
        let mut delivery = Self::normalize(&raw, FetchOrigin::Poll);

        // Live location is a separate sub-resource that may not exist yet;
        // a failure here degrades to "no location" rather than an error.
        if delivery
            .driver
            .as_ref()
            .is_some_and(|d| d.location.is_none())
        {
            let loc_url = format!("{}/v1/orders/{external_id}/dasher_location", self.base_url);
            let location = fetch_json(&self.ctx, PLATFORM, "doordash dasher location", || {
                self.ctx.http.get(&loc_url).bearer_auth(&token)
            })
            .await
            .ok()
            .and_then(|body| serde_json::from_value::<RawLocation>(body).ok());
            if let (Some(driver), Some(loc)) = (delivery.driver.as_mut(), location) {
                driver.location = Some(DriverLocation {
                    lat: loc.lat,
                    lng: loc.lng,
                    heading: loc.heading,
                    speed: loc.speed_mps,
                    updated_at: loc
                        .reported_at
                        .as_ref()
                        .and_then(timeparse::parse_timestamp)
                        .unwrap_or_else(Utc::now),
                });
            }
        }
        Ok(delivery)
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
            "order.status_changed" | "order.updated" => {
                let Some(order) = payload.data.get("order") else {
                    return Ok(NormalizedWebhook::Insufficient);
                };
                let raw: RawOrder = serde_json::from_value(order.clone())
                    .map_err(|e| AdapterError::deserialize("doordash webhook order", &e))?;
                Ok(NormalizedWebhook::Full(Box::new(Self::normalize(
                    &raw,
                    FetchOrigin::Webhook,
                ))))
            }
            "dasher.location_updated" => {
                let Some(order_id) = payload.data.get("order_id").and_then(|v| v.as_str()) else {
                    return Ok(NormalizedWebhook::Insufficient);
                };
                let Ok(loc) =
                    serde_json::from_value::<RawLocation>(payload.data["location"].clone())
                else {
                    return Ok(NormalizedWebhook::Insufficient);
                };
                Ok(NormalizedWebhook::Partial(DeliveryDelta {
                    delivery_id: derive_delivery_id(PLATFORM, order_id, None),
                    status: None,
                    location: Some(DriverLocation {
                        lat: loc.lat,
                        lng: loc.lng,
                        heading: loc.heading,
                        speed: loc.speed_mps,
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
    fn maps_known_statuses() {
        assert_eq!(map_raw_status("Dasher Assigned"), DeliveryStatus::DriverAssigned);
        assert_eq!(map_raw_status("enroute_to_dropoff"), DeliveryStatus::OutForDelivery);
        assert_eq!(map_raw_status("dropped-off"), DeliveryStatus::Delivered);
        assert_eq!(map_raw_status("canceled"), DeliveryStatus::Cancelled);
    }

    #[test]
    fn unmapped_status_fails_open_to_preparing() {
        assert_eq!(map_raw_status("quantum_flux"), DeliveryStatus::Preparing);
        assert_eq!(map_raw_status(""), DeliveryStatus::Preparing);
    }

    #[test]
    fn normalize_masks_driver_contact() {
        let raw: RawOrder = serde_json::from_value(serde_json::json!({
            "id": "8842",
            "status": "picked_up",
            "dasher": {
                "first_name": "Maria",
                "last_name": "Gonzalez",
                "phone_number": "(555) 867-5289",
                "rating": 4.9,
                "vehicle_type": "bike"
            }
        }))
        .unwrap();
        let delivery = DoordashAdapter::normalize(&raw, FetchOrigin::Poll);
        let driver = delivery.driver.unwrap();
        assert_eq!(driver.name.as_deref(), Some("Maria G."));
        assert_eq!(driver.masked_phone.as_deref(), Some("(555) ***-**89"));
        assert_eq!(delivery.id, "dd_8842");
        assert_eq!(delivery.status, DeliveryStatus::OutForDelivery);
    }

    #[test]
    fn normalize_populates_sparse_timeline() {
        let raw: RawOrder = serde_json::from_value(serde_json::json!({
            "id": "1",
            "status": "delivered",
            "timeline": {
                "placed": "2026-08-29T11:00:00Z",
                "delivered": "2026-08-29T12:00:00Z",
                "unknown_key": "2026-08-29T11:30:00Z"
            }
        }))
        .unwrap();
        let delivery = DoordashAdapter::normalize(&raw, FetchOrigin::Poll);
        assert_eq!(delivery.timestamps.len(), 2);
        assert!(delivery.timestamps.contains_key(&LifecycleEvent::Ordered));
        assert!(delivery.timestamps.contains_key(&LifecycleEvent::Delivered));
    }
}
