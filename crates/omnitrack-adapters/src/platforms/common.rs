//! Helpers shared by the concrete platform adapters.

use omnitrack_core::Platform;
use reqwest::RequestBuilder;

use crate::adapter::metadata;
use crate::context::AdapterContext;
use crate::error::AdapterError;
use crate::http::check_status;
use crate::retry::retry_with_backoff;

/// Rate-limited, retried JSON fetch. Every outbound adapter call funnels
/// through here: the limiter is consulted before each attempt and the retry
/// policy wraps the whole exchange.
///
/// `build` constructs a fresh request per attempt (a sent `RequestBuilder`
/// is consumed, so retries need a new one).
///
/// # Errors
///
/// The full taxonomy: rate-limit, auth, availability, network, and data
/// errors, as produced by [`check_status`] and body deserialization.
pub(crate) async fn fetch_json<F>(
    ctx: &AdapterContext,
    platform: Platform,
    context_label: &str,
    build: F,
) -> Result<serde_json::Value, AdapterError>
where
    F: Fn() -> RequestBuilder,
{
    let limit = metadata(platform).rate_limit;
    retry_with_backoff(ctx.max_retries, ctx.backoff_base_ms, || {
        let request = build();
        async move {
            ctx.limiter.check(platform, limit).await?;
            let response = request.send().await?;
            let response = check_status(platform, response, ctx.rate_limit_fallback_secs)?;
            let body = response.text().await?;
            serde_json::from_str(&body)
                .map_err(|e| AdapterError::deserialize(context_label, &e))
        }
    })
    .await
}

/// Recover the platform-external order id from a derived delivery id.
///
/// `"dd_8842"` → `"8842"`; `"am_114-552_shipment_2"` → `("114-552", Some("2"))`.
///
/// # Errors
///
/// [`AdapterError::Data`] when the id does not carry this platform's prefix.
pub(crate) fn split_delivery_id<'a>(
    platform: Platform,
    delivery_id: &'a str,
) -> Result<(&'a str, Option<&'a str>), AdapterError> {
    let prefix = format!("{}_", platform.id_prefix());
    let rest = delivery_id
        .strip_prefix(&prefix)
        .ok_or_else(|| AdapterError::Data {
            context: format!("{platform} delivery id"),
            reason: format!("id '{delivery_id}' does not carry prefix '{prefix}'"),
        })?;
    match rest.split_once("_shipment_") {
        Some((external, sub)) => Ok((external, Some(sub))),
        None => Ok((rest, None)),
    }
}
