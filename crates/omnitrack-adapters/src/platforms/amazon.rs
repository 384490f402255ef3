//! Amazon adapter: signed-request auth, shipment-level tracking.
//!
//! One Amazon order can ship in several boxes; each shipment becomes its
//! own delivery with a `_shipment_<n>` id suffix when the order has more
//! than one.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use omnitrack_core::delivery::{
    DeliveryMeta, Destination, DriverInfo, DriverLocation, EtaInfo, FetchOrigin, OrderInfo,
    TrackingInfo,
};
use omnitrack_core::webhook::{DeliveryDelta, NormalizedWebhook, WebhookPayload};
use omnitrack_core::{derive_delivery_id, timeparse, DeliveryStatus, Platform, UnifiedDelivery};
use serde::Deserialize;

use crate::adapter::{AdapterConnection, PlatformAdapter};
use crate::auth::SignedRequestAuth;
use crate::context::AdapterContext;
use crate::error::AdapterError;
use crate::platforms::common::{fetch_json, split_delivery_id};

const DEFAULT_BASE_URL: &str = "https://delivery.amazon.com";
const PLATFORM: Platform = Platform::Amazon;

pub(crate) fn map_raw_status(raw: &str) -> DeliveryStatus {
    match omnitrack_core::status::normalize_status_key(raw).as_str() {
        "shipped" | "in_transit" => DeliveryStatus::Preparing,
        "at_delivery_station" => DeliveryStatus::ReadyForPickup,
        "out_for_delivery" => DeliveryStatus::OutForDelivery,
        "stops_away" | "arriving_soon" => DeliveryStatus::Arriving,
        "delivered" => DeliveryStatus::Delivered,
        "cancelled" | "canceled" | "returned_to_sender" => DeliveryStatus::Cancelled,
        "delayed" | "delivery_attempted" => DeliveryStatus::Delayed,
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
    item_count: Option<u32>,
    shipments: Vec<RawShipment>,
}

#[derive(Debug, Deserialize)]
struct RawShipment {
    shipment_index: u32,
    status: String,
    status_updated_at: Option<serde_json::Value>,
    promised_by: Option<serde_json::Value>,
    stops_remaining: Option<u32>,
    vehicle_location: Option<RawLocation>,
    destination: Option<RawAddress>,
    tracking_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    lat: f64,
    lng: f64,
    updated_at: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    formatted: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
}

fn normalize_shipment(
    order: &RawOrder,
    shipment: &RawShipment,
    origin: FetchOrigin,
) -> UnifiedDelivery {
    // The suffix only appears when the order actually split.
    let sub_id = (order.shipments.len() > 1).then(|| shipment.shipment_index.to_string());
    UnifiedDelivery {
        id: derive_delivery_id(PLATFORM, &order.order_id, sub_id.as_deref()),
        platform: PLATFORM,
        fulfilled_by: None,
        status: map_raw_status(&shipment.status),
        status_updated_at: shipment
            .status_updated_at
            .as_ref()
            .and_then(timeparse::parse_timestamp)
            .unwrap_or_else(Utc::now),
        driver: shipment.vehicle_location.as_ref().map(|loc| DriverInfo {
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
            address: shipment.destination.as_ref().and_then(|a| a.formatted.clone()),
            lat: shipment.destination.as_ref().and_then(|a| a.lat),
            lng: shipment.destination.as_ref().and_then(|a| a.lng),
            instructions: None,
        },
        eta: EtaInfo {
            estimated_arrival: shipment
                .promised_by
                .as_ref()
                .and_then(timeparse::parse_timestamp),
            minutes_remaining: None,
            distance_km: None,
            stops_remaining: shipment.stops_remaining,
        },
        order: OrderInfo {
            item_count: order.item_count.unwrap_or(0),
            total_amount: 0,
            currency: "USD".to_owned(),
            items: None,
        },
        tracking: TrackingInfo {
            url: shipment.tracking_url.clone(),
            map_available: shipment.vehicle_location.is_some(),
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

pub struct AmazonAdapter {
    ctx: AdapterContext,
    base_url: String,
    auth: SignedRequestAuth,
}

impl AmazonAdapter {
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

    /// A bearer token from the connection's signing key. An auth failure on
    /// the subsequent request must call `invalidate` so the next attempt
    /// mints fresh.
    async fn bearer(&self, connection: &AdapterConnection) -> Result<String, AdapterError> {
        let (key_id, secret) = connection.credential.signing_key(PLATFORM)?;
        self.auth.bearer_token(key_id, secret).await
    }

    async fn fetch_orders(
        &self,
        connection: &AdapterConnection,
        url: &str,
        label: &str,
    ) -> Result<OrdersResponse, AdapterError> {
        let token = self.bearer(connection).await?;
        let result = fetch_json(&self.ctx, PLATFORM, label, || {
            self.ctx.http.get(url).bearer_auth(&token)
        })
        .await;
        if let Err(AdapterError::Auth { .. }) = &result {
            if let Ok((key_id, _)) = connection.credential.signing_key(PLATFORM) {
                self.auth.invalidate(key_id).await;
            }
        }
        let body = result?;
        serde_json::from_value(body).map_err(|e| AdapterError::deserialize(label, &e))
    }
}

#[async_trait]
impl PlatformAdapter for AmazonAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn get_active_deliveries(
        &self,
        connection: &AdapterConnection,
    ) -> Result<Vec<UnifiedDelivery>, AdapterError> {
        let url = format!("{}/v1/orders?filter=open", self.base_url);
        let response = self
            .fetch_orders(connection, &url, "amazon open orders")
            .await?;
        Ok(response
            .orders
            .iter()
            .flat_map(|order| {
                order
                    .shipments
                    .iter()
                    .map(move |shipment| normalize_shipment(order, shipment, FetchOrigin::Poll))
            })
            .filter(UnifiedDelivery::is_active)
            .collect())
    }

    async fn get_delivery_details(
        &self,
        connection: &AdapterConnection,
        delivery_id: &str,
    ) -> Result<UnifiedDelivery, AdapterError> {
        let (external_id, sub_id) = split_delivery_id(PLATFORM, delivery_id)?;
        let url = format!("{}/v1/orders/{external_id}", self.base_url);
        let token = self.bearer(connection).await?;
        let result = fetch_json(&self.ctx, PLATFORM, "amazon order detail", || {
            self.ctx.http.get(&url).bearer_auth(&token)
        })
        .await;
        if let Err(AdapterError::Auth { .. }) = &result {
            if let Ok((key_id, _)) = connection.credential.signing_key(PLATFORM) {
                self.auth.invalidate(key_id).await;
            }
        }
        let order: RawOrder = serde_json::from_value(result?)
            .map_err(|e| AdapterError::deserialize("amazon order detail", &e))?;
        let shipment = match sub_id {
            Some(sub) => order
                .shipments
                .iter()
                .find(|s| s.shipment_index.to_string() == sub),
            None => order.shipments.first(),
        }
        .ok_or_else(|| AdapterError::Data {
            context: "amazon order detail".to_owned(),
            reason: format!("order {external_id} has no matching shipment"),
        })?;
        Ok(normalize_shipment(&order, shipment, FetchOrigin::Poll))
    }

    fn map_status(&self, raw: &str) -> DeliveryStatus {
        map_raw_status(raw)
    }

    fn normalize_webhook(
        &self,
        payload: &WebhookPayload,
    ) -> Result<NormalizedWebhook, AdapterError> {
        match payload.event_type.as_str() {
            "shipment.updated" => {
                let order: RawOrder = serde_json::from_value(payload.data.clone())
                    .map_err(|e| AdapterError::deserialize("amazon webhook order", &e))?;
                let Some(shipment) = order.shipments.first() else {
                    return Ok(NormalizedWebhook::Insufficient);
                };
                Ok(NormalizedWebhook::Full(Box::new(normalize_shipment(
                    &order,
                    shipment,
                    FetchOrigin::Webhook,
                ))))
            }
            "shipment.progress" => {
                let Some(order_id) = payload.data.get("order_id").and_then(|v| v.as_str()) else {
                    return Ok(NormalizedWebhook::Insufficient);
                };
                let sub_id = payload
                    .data
                    .get("shipment_index")
                    .and_then(serde_json::Value::as_u64)
                    .map(|n| n.to_string());
                let status = payload
                    .data
                    .get("status")
                    .and_then(|v| v.as_str())
                    .map(map_raw_status);
                let location = payload.data.get("vehicle_location").and_then(|loc| {
                    let lat = loc.get("lat").and_then(serde_json::Value::as_f64)?;
                    let lng = loc.get("lng").and_then(serde_json::Value::as_f64)?;
                    Some(DriverLocation {
                        lat,
                        lng,
                        heading: None,
                        speed: None,
                        updated_at: payload.timestamp,
                    })
                });
                if status.is_none() && location.is_none() {
                    return Ok(NormalizedWebhook::Insufficient);
                }
                Ok(NormalizedWebhook::Partial(DeliveryDelta {
                    delivery_id: derive_delivery_id(PLATFORM, order_id, sub_id.as_deref()),
                    status,
                    location,
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

    fn order(shipments: serde_json::Value) -> RawOrder {
        serde_json::from_value(serde_json::json!({
            "order_id": "114-552",
            "item_count": 3,
            "shipments": shipments
        }))
        .unwrap()
    }

    #[test]
    fn single_shipment_gets_plain_id() {
        let order = order(serde_json::json!([
            { "shipment_index": 1, "status": "out_for_delivery" }
        ]));
        let delivery = normalize_shipment(&order, &order.shipments[0], FetchOrigin::Poll);
        assert_eq!(delivery.id, "am_114-552");
    }

    #[test]
    fn split_order_gets_shipment_suffix() {
        let order = order(serde_json::json!([
            { "shipment_index": 1, "status": "delivered" },
            { "shipment_index": 2, "status": "out_for_delivery", "stops_remaining": 4 }
        ]));
        let second = normalize_shipment(&order, &order.shipments[1], FetchOrigin::Poll);
        assert_eq!(second.id, "am_114-552_shipment_2");
        assert_eq!(second.eta.stops_remaining, Some(4));
    }

    #[test]
    fn in_transit_parcels_read_as_preparing() {
        assert_eq!(map_raw_status("in_transit"), DeliveryStatus::Preparing);
        assert_eq!(map_raw_status("stops_away"), DeliveryStatus::Arriving);
        assert_eq!(map_raw_status("delivery_attempted"), DeliveryStatus::Delayed);
    }

    #[test]
    fn progress_webhook_without_useful_fields_is_insufficient() {
        let adapter = AmazonAdapter::new(crate::context::AdapterContext::for_tests());
        let payload = WebhookPayload {
            platform: PLATFORM,
            event_type: "shipment.progress".to_owned(),
            event_id: "e1".to_owned(),
            timestamp: Utc::now(),
            data: serde_json::json!({ "order_id": "114-552" }),
            signature: None,
        };
        assert!(matches!(
            adapter.normalize_webhook(&payload).unwrap(),
            NormalizedWebhook::Insufficient
        ));
    }

    #[test]
    fn progress_webhook_with_status_is_a_delta() {
        let adapter = AmazonAdapter::new(crate::context::AdapterContext::for_tests());
        let payload = WebhookPayload {
            platform: PLATFORM,
            event_type: "shipment.progress".to_owned(),
            event_id: "e2".to_owned(),
            timestamp: Utc::now(),
            data: serde_json::json!({
                "order_id": "114-552",
                "shipment_index": 2,
                "status": "out_for_delivery"
            }),
            signature: None,
        };
        let NormalizedWebhook::Partial(delta) = adapter.normalize_webhook(&payload).unwrap()
        else {
            panic!("expected partial");
        };
        assert_eq!(delta.delivery_id, "am_114-552_shipment_2");
        assert_eq!(delta.status, Some(DeliveryStatus::OutForDelivery));
    }
}
