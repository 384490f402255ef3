//! Costco adapter: captured-session auth. Same-day grocery is fulfilled by
//! Instacart's shopper network, so records reuse Instacart's status
//! vocabulary and carry `fulfilled_by: Instacart`.

use async_trait::async_trait;
use omnitrack_core::delivery::FetchOrigin;
use omnitrack_core::{DeliveryStatus, Platform, UnifiedDelivery};
use serde::Deserialize;

use crate::adapter::{AdapterConnection, PlatformAdapter};
use crate::context::AdapterContext;
use crate::error::AdapterError;
use crate::platforms::common::{fetch_json, split_delivery_id};
use crate::platforms::instacart;

const DEFAULT_BASE_URL: &str = "https://sameday.costco.com";
const PLATFORM: Platform = Platform::Costco;

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    orders: Vec<instacart::RawOrder>,
}

pub struct CostcoAdapter {
    ctx: AdapterContext,
    base_url: String,
}

impl CostcoAdapter {
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
impl PlatformAdapter for CostcoAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn get_active_deliveries(
        &self,
        connection: &AdapterConnection,
    ) -> Result<Vec<UnifiedDelivery>, AdapterError> {
        let cookies = connection.credential.session_cookies(PLATFORM)?.to_owned();
        let url = format!("{}/api/orders?state=active", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "costco active orders", || {
            self.ctx
                .http
                .get(&url)
                .header(reqwest::header::COOKIE, &cookies)
        })
        .await?;
        let response: OrdersResponse = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("costco active orders", &e))?;
        Ok(response
            .orders
            .iter()
            .map(|raw| {
                instacart::normalize_order(
                    raw,
                    PLATFORM,
                    Some(Platform::Instacart),
                    FetchOrigin::Poll,
                )
            })
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
        let url = format!("{}/api/orders/{external_id}", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "costco order detail", || {
            self.ctx
                .http
                .get(&url)
                .header(reqwest::header::COOKIE, &cookies)
        })
        .await?;
        let raw: instacart::RawOrder = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("costco order detail", &e))?;
        Ok(instacart::normalize_order(
            &raw,
            PLATFORM,
            Some(Platform::Instacart),
            FetchOrigin::Poll,
        ))
    }

    fn map_status(&self, raw: &str) -> DeliveryStatus {
        instacart::map_raw_status(raw)
    }
}
