//! Grubhub adapter: OAuth2, poll-only (no webhook surface).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use omnitrack_core::delivery::{
    DeliveryMeta, Destination, DriverInfo, DriverLocation, EtaInfo, FetchOrigin, OrderInfo,
    OrderItem, TrackingInfo,
};
use omnitrack_core::{
    derive_delivery_id, mask, timeparse, DeliveryStatus, Platform, UnifiedDelivery,
};
use serde::Deserialize;

use crate::adapter::{AdapterConnection, PlatformAdapter};
use crate::auth::{OAuthClient, OAuthConfig, TokenSet};
use crate::context::AdapterContext;
use crate::error::AdapterError;
use crate::platforms::common::{fetch_json, split_delivery_id};

const DEFAULT_BASE_URL: &str = "https://api-gtw.grubhub.com";
const PLATFORM: Platform = Platform::Grubhub;

pub(crate) fn map_raw_status(raw: &str) -> DeliveryStatus {
    match omnitrack_core::status::normalize_status_key(raw).as_str() {
        "ready" | "ready_for_pickup" => DeliveryStatus::ReadyForPickup,
        "driver_assigned" => DeliveryStatus::DriverAssigned,
        "driver_en_route_to_restaurant" => DeliveryStatus::DriverHeadingToStore,
        "driver_at_restaurant" => DeliveryStatus::DriverAtStore,
        "out_for_delivery" | "in_transit" => DeliveryStatus::OutForDelivery,
        "approaching" => DeliveryStatus::Arriving,
        "delivered" | "complete" => DeliveryStatus::Delivered,
        "cancelled" | "canceled" => DeliveryStatus::Cancelled,
        "running_late" => DeliveryStatus::Delayed,
        _ => DeliveryStatus::Preparing,
    }
}

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    orders: Vec<RawOrder>,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    order_number: String,
    delivery_state: String,
    state_timestamp: Option<serde_json::Value>,
    driver: Option<RawDriver>,
    delivery_address: Option<RawAddress>,
    eta_minutes: Option<f64>,
    line_items: Option<Vec<RawItem>>,
    order_total_cents: Option<i64>,
    tracking_link: Option<String>,
}

// Grubhub exposes position but no driver contact details.
#[derive(Debug, Deserialize)]
struct RawDriver {
    display_name: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    position_updated_at: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    street: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    name: String,
    quantity: Option<u32>,
}

pub struct GrubhubAdapter {
    ctx: AdapterContext,
    base_url: String,
    oauth: OAuthClient,
}

impl GrubhubAdapter {
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
        let driver = raw.driver.as_ref().map(|driver| DriverInfo {
            name: driver.display_name.as_deref().map(mask::mask_name),
            masked_phone: None,
            rating: None,
            vehicle: None,
            location: match (driver.lat, driver.lng) {
                (Some(lat), Some(lng)) => Some(DriverLocation {
                    lat,
                    lng,
                    heading: None,
                    speed: None,
                    updated_at: driver
                        .position_updated_at
                        .as_ref()
                        .and_then(timeparse::parse_timestamp)
                        .unwrap_or_else(Utc::now),
                }),
                _ => None,
            },
        });

        UnifiedDelivery {
            id: derive_delivery_id(PLATFORM, &raw.order_number, None),
            platform: PLATFORM,
            fulfilled_by: None,
            status: map_raw_status(&raw.delivery_state),
            status_updated_at: raw
                .state_timestamp
                .as_ref()
                .and_then(timeparse::parse_timestamp)
                .unwrap_or_else(Utc::now),
            driver,
            destination: Destination {
                address: raw.delivery_address.as_ref().and_then(|a| a.street.clone()),
                lat: raw.delivery_address.as_ref().and_then(|a| a.lat),
                lng: raw.delivery_address.as_ref().and_then(|a| a.lng),
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
                    .line_items
                    .as_ref()
                    .map(|i| i.len().try_into().unwrap_or(0))
                    .unwrap_or(0),
                total_amount: raw.order_total_cents.unwrap_or(0),
                currency: "USD".to_owned(),
                items: raw.line_items.as_ref().map(|items| {
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
                url: raw.tracking_link.clone(),
                map_available: true,
                live_updates: false,
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
}

#[async_trait]
impl PlatformAdapter for GrubhubAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn get_active_deliveries(
        &self,
        connection: &AdapterConnection,
    ) -> Result<Vec<UnifiedDelivery>, AdapterError> {
        let token = connection.credential.oauth_access_token(PLATFORM)?.to_owned();
        let url = format!("{}/diners/orders?filter=active", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "grubhub active orders", || {
            self.ctx.http.get(&url).bearer_auth(&token)
        })
        .await?;
        let response: OrdersResponse = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("grubhub active orders", &e))?;
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
        let token = connection.credential.oauth_access_token(PLATFORM)?.to_owned();
        let url = format!("{}/diners/orders/{external_id}", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "grubhub order detail", || {
            self.ctx.http.get(&url).bearer_auth(&token)
        })
        .await?;
        let raw: RawOrder = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("grubhub order detail", &e))?;
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_statuses_and_fails_open() {
        assert_eq!(map_raw_status("In Transit"), DeliveryStatus::OutForDelivery);
        assert_eq!(map_raw_status("running_late"), DeliveryStatus::Delayed);
        assert_eq!(map_raw_status("whatever"), DeliveryStatus::Preparing);
    }

    #[test]
    fn normalize_never_exposes_driver_contact() {
        let raw: RawOrder = serde_json::from_value(serde_json::json!({
            "order_number": "GH-77",
            "delivery_state": "out_for_delivery",
            "driver": { "display_name": "Devon Carter", "lat": 33.99, "lng": -81.02 },
            "eta_minutes": 14.0
        }))
        .unwrap();
        let delivery = GrubhubAdapter::normalize(&raw, FetchOrigin::Poll);
        let driver = delivery.driver.unwrap();
        assert_eq!(driver.name.as_deref(), Some("Devon C."));
        assert!(driver.masked_phone.is_none());
        assert!(driver.location.is_some());
        assert_eq!(delivery.eta.minutes_remaining, Some(14.0));
        assert!(!delivery.tracking.driver_contactable);
    }
}
