//! Sam's Club adapter: captured-session auth. Delivery is fulfilled by
//! Shipt's shopper network, so records reuse Shipt's status vocabulary and
//! carry `fulfilled_by: Shipt`.

use async_trait::async_trait;
use omnitrack_core::delivery::FetchOrigin;
use omnitrack_core::{DeliveryStatus, Platform, UnifiedDelivery};
use serde::Deserialize;

use crate::adapter::{AdapterConnection, PlatformAdapter};
use crate::context::AdapterContext;
use crate::error::AdapterError;
use crate::platforms::common::{fetch_json, split_delivery_id};
use crate::platforms::shipt;

const DEFAULT_BASE_URL: &str = "https://www.samsclub.com";
const PLATFORM: Platform = Platform::SamsClub;

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    orders: Vec<shipt::RawOrder>,
}

pub struct SamsClubAdapter {
    ctx: AdapterContext,
    base_url: String,
}

impl SamsClubAdapter {
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
impl PlatformAdapter for SamsClubAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn get_active_deliveries(
        &self,
        connection: &AdapterConnection,
    ) -> Result<Vec<UnifiedDelivery>, AdapterError> {
        let cookies = connection.credential.session_cookies(PLATFORM)?.to_owned();
        let url = format!("{}/api/delivery/orders?active=true", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "sam's club active orders", || {
            self.ctx
                .http
                .get(&url)
                .header(reqwest::header::COOKIE, &cookies)
        })
        .await?;
        let response: OrdersResponse = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("sam's club active orders", &e))?;
        Ok(response
            .orders
            .iter()
            .map(|raw| {
                shipt::normalize_order(raw, PLATFORM, Some(Platform::Shipt), FetchOrigin::Poll)
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
        let url = format!("{}/api/delivery/orders/{external_id}", self.base_url);
        let body = fetch_json(&self.ctx, PLATFORM, "sam's club order detail", || {
            self.ctx
                .http
                .get(&url)
                .header(reqwest::header::COOKIE, &cookies)
        })
        .await?;
        let raw: shipt::RawOrder = serde_json::from_value(body)
            .map_err(|e| AdapterError::deserialize("sam's club order detail", &e))?;
        Ok(shipt::normalize_order(
            &raw,
            PLATFORM,
            Some(Platform::Shipt),
            FetchOrigin::Poll,
        ))
    }

    fn map_status(&self, raw: &str) -> DeliveryStatus {
        shipt::map_raw_status(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_vocabulary_is_shipts() {
        let adapter = SamsClubAdapter::new(crate::context::AdapterContext::for_tests());
        assert_eq!(adapter.map_status("claimed"), DeliveryStatus::DriverAssigned);
        assert_eq!(adapter.map_status("late"), DeliveryStatus::Delayed);
    }
}
