//! Shared HTTP client construction and response-status mapping.

use std::time::Duration;

use omnitrack_core::Platform;
use reqwest::{Client, Response, StatusCode};

use crate::error::AdapterError;

/// Build the reqwest client every adapter uses: bounded request timeout,
/// bounded connect timeout, explicit user agent.
///
/// # Errors
///
/// Returns [`AdapterError::Network`] if the client cannot be constructed.
pub fn build_client(timeout_secs: u64, user_agent: &str) -> Result<Client, AdapterError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

/// Map a response's status into the error taxonomy, or hand the response
/// back untouched on 2xx.
///
/// - 401/403 → [`AdapterError::Auth`]
/// - 429 → [`AdapterError::RateLimited`], honouring `Retry-After` when
///   present and falling back to `fallback_retry_after_secs`
/// - 5xx → [`AdapterError::PlatformUnavailable`]
/// - any other non-2xx → [`AdapterError::Data`] with the status as diagnostic
///
/// # Errors
///
/// As described above; 2xx responses are returned as `Ok`.
pub fn check_status(
    platform: Platform,
    response: Response,
    fallback_retry_after_secs: u64,
) -> Result<Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AdapterError::Auth {
            platform,
            reason: format!("HTTP {status}"),
        });
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(fallback_retry_after_secs);
        return Err(AdapterError::RateLimited {
            platform,
            retry_after_secs,
        });
    }
    if status.is_server_error() {
        return Err(AdapterError::PlatformUnavailable {
            platform,
            status: status.as_u16(),
        });
    }
    Err(AdapterError::Data {
        context: format!("{platform} response"),
        reason: format!("unexpected HTTP {status}"),
    })
}
