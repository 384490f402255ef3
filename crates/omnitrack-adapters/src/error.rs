//! Typed error taxonomy shared by every platform adapter.
//!
//! Retry/backoff logic is purely a function of [`AdapterError::retryable`];
//! nothing in the retry path branches on platform identity.

use omnitrack_core::Platform;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Credential rejected or expired. Never retried automatically; the
    /// stored credential must be refreshed or re-issued out of band.
    #[error("{platform} authentication failed: {reason}")]
    Auth { platform: Platform, reason: String },

    /// Upstream 429 or local token bucket exhausted. Retryable after
    /// `retry_after_secs`.
    #[error("{platform} rate limited (retry after {retry_after_secs}s)")]
    RateLimited {
        platform: Platform,
        retry_after_secs: u64,
    },

    /// Upstream 5xx. Retryable with fixed backoff.
    #[error("{platform} unavailable (HTTP {status})")]
    PlatformUnavailable { platform: Platform, status: u16 },

    /// Network or TLS failure from the underlying HTTP client, including
    /// timeouts. Retryable with short backoff.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Malformed upstream payload. Not retryable; carries the raw diagnostic.
    #[error("data error for {context}: {reason}")]
    Data { context: String, reason: String },

    /// Webhook signature verification failed. Terminal; the payload is
    /// dropped without further processing.
    #[error("{platform} webhook signature invalid")]
    WebhookInvalid { platform: Platform },

    /// The adapter does not implement the requested capability. An ordinary
    /// outcome, not a fault: callers check capabilities and treat this as
    /// "not supported".
    #[error("{platform} does not support {capability}")]
    Unsupported {
        platform: Platform,
        capability: &'static str,
    },
}

impl AdapterError {
    /// Whether a generic retry wrapper may re-invoke the failed operation.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            AdapterError::RateLimited { .. } | AdapterError::PlatformUnavailable { .. } => true,
            AdapterError::Network(e) => {
                // 4xx surfaced through error_for_status is not transient.
                e.status().is_none_or(|s| s.is_server_error())
            }
            AdapterError::Auth { .. }
            | AdapterError::Data { .. }
            | AdapterError::WebhookInvalid { .. }
            | AdapterError::Unsupported { .. } => false,
        }
    }

    /// Upstream-advertised wait, when the error carries one. Overrides the
    /// computed backoff delay in the retry wrapper.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AdapterError::RateLimited {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Helper for JSON-shape failures, keeping the serde error text as the
    /// diagnostic.
    #[must_use]
    pub fn deserialize(context: impl Into<String>, source: &serde_json::Error) -> Self {
        AdapterError::Data {
            context: context.into(),
            reason: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_is_not_retryable() {
        let err = AdapterError::Auth {
            platform: Platform::Doordash,
            reason: "expired".to_owned(),
        };
        assert!(!err.retryable());
        assert!(err.retry_after_secs().is_none());
    }

    #[test]
    fn rate_limited_is_retryable_with_retry_after() {
        let err = AdapterError::RateLimited {
            platform: Platform::Instacart,
            retry_after_secs: 30,
        };
        assert!(err.retryable());
        assert_eq!(err.retry_after_secs(), Some(30));
    }

    #[test]
    fn unavailable_is_retryable() {
        let err = AdapterError::PlatformUnavailable {
            platform: Platform::Amazon,
            status: 503,
        };
        assert!(err.retryable());
    }

    #[test]
    fn data_and_webhook_errors_are_not_retryable() {
        let data = AdapterError::Data {
            context: "orders".to_owned(),
            reason: "missing field".to_owned(),
        };
        let webhook = AdapterError::WebhookInvalid {
            platform: Platform::UberEats,
        };
        assert!(!data.retryable());
        assert!(!webhook.retryable());
    }

    #[test]
    fn unsupported_is_not_retryable() {
        let err = AdapterError::Unsupported {
            platform: Platform::Shipt,
            capability: "oauth",
        };
        assert!(!err.retryable());
    }
}
