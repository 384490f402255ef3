//! The `PlatformAdapter` contract and static per-platform metadata.
//!
//! One trait, composition underneath: every concrete adapter pairs an HTTP
//! client with one auth strategy and a normalization function. "Not
//! supported" is an ordinary outcome — callers check
//! [`AdapterMetadata::capabilities`] before invoking optional operations,
//! and the default implementations return [`AdapterError::Unsupported`]
//! rather than panicking.

use async_trait::async_trait;
use omnitrack_core::webhook::{NormalizedWebhook, WebhookPayload};
use omnitrack_core::{DeliveryStatus, Platform, UnifiedDelivery};

use crate::auth::{Credential, TokenSet};
use crate::error::AdapterError;
use crate::rate_limit::RateLimit;

/// Per-call context: a decrypted credential plus the identifiers needed to
/// attribute the call. Constructed fresh per request from encrypted storage;
/// never persisted in this form.
#[derive(Debug, Clone)]
pub struct AdapterConnection {
    pub user_id: String,
    pub platform: Platform,
    pub credential: Credential,
}

/// Capability flags: what an adapter can do, queryable before calling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub oauth: bool,
    pub webhooks: bool,
    pub live_location: bool,
    pub driver_contact: bool,
    pub session_auth: bool,
    pub order_items: bool,
    pub eta_updates: bool,
}

/// Keyed-hash scheme a platform uses to sign webhook deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookScheme {
    /// `hex(hmac_sha256(secret, body))`
    HmacSha256Hex,
    /// `base64(hmac_sha256(secret, body))`
    HmacSha256Base64,
    /// `hex(hmac_sha256(secret, "<timestamp>.<body>"))`
    TimestampedHmacSha256,
}

/// Recommended polling cadence, seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub min: u64,
    pub default: u64,
    pub max: u64,
}

/// Static per-platform descriptor. Immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct AdapterMetadata {
    pub platform: Platform,
    pub display_name: &'static str,
    /// Brand hex color for clients.
    pub color: &'static str,
    pub capabilities: Capabilities,
    pub poll_intervals: PollIntervals,
    pub rate_limit: RateLimit,
    pub webhook_scheme: Option<WebhookScheme>,
    /// Historical ETA accuracy weight (0–15), fed into the confidence score.
    pub eta_accuracy_weight: u8,
}

/// The polymorphic adapter contract.
///
/// Required: active-delivery listing, single-order detail, and the total
/// status mapping. Optional operations default to
/// [`AdapterError::Unsupported`]; adapters implement the ones their
/// capability flags advertise.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    fn metadata(&self) -> &'static AdapterMetadata {
        metadata(self.platform())
    }

    /// Fetch all non-terminal orders for the connection's account.
    async fn get_active_deliveries(
        &self,
        connection: &AdapterConnection,
    ) -> Result<Vec<UnifiedDelivery>, AdapterError>;

    /// Fetch one order by its derived delivery id. Missing sub-resources
    /// (no courier assigned yet, no live location) are omitted, not errors.
    async fn get_delivery_details(
        &self,
        connection: &AdapterConnection,
        delivery_id: &str,
    ) -> Result<UnifiedDelivery, AdapterError>;

    /// Total mapping from a raw platform status string to the canonical
    /// vocabulary. Unmapped values return `Preparing` — fail open to the
    /// earliest state, never to a terminal one.
    fn map_status(&self, raw: &str) -> DeliveryStatus;

    /// Cheap authenticated probe, used after connecting an account.
    async fn test_connection(&self, connection: &AdapterConnection) -> Result<(), AdapterError> {
        self.get_active_deliveries(connection).await.map(|_| ())
    }

    async fn oauth_authorize_url(&self, _state: &str) -> Result<String, AdapterError> {
        Err(self.unsupported("oauth"))
    }

    async fn exchange_code(&self, _state: &str, _code: &str) -> Result<TokenSet, AdapterError> {
        Err(self.unsupported("oauth"))
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenSet, AdapterError> {
        Err(self.unsupported("oauth"))
    }

    async fn revoke_token(&self, _token: &str) -> Result<(), AdapterError> {
        Err(self.unsupported("oauth"))
    }

    /// Normalize a verified webhook body. Full snapshots become
    /// [`NormalizedWebhook::Full`]; deltas become `Partial`; anything else is
    /// `Insufficient` and the caller falls back to its cached record.
    fn normalize_webhook(
        &self,
        _payload: &WebhookPayload,
    ) -> Result<NormalizedWebhook, AdapterError> {
        Err(self.unsupported("webhooks"))
    }

    fn unsupported(&self, capability: &'static str) -> AdapterError {
        AdapterError::Unsupported {
            platform: self.platform(),
            capability,
        }
    }
}

/// Static metadata for `platform`.
#[must_use]
pub fn metadata(platform: Platform) -> &'static AdapterMetadata {
    &METADATA[Platform::ALL
        .iter()
        .position(|p| *p == platform)
        .expect("every platform has metadata")]
}

static METADATA: [AdapterMetadata; 11] = [
    AdapterMetadata {
        platform: Platform::Doordash,
        display_name: "DoorDash",
        color: "#eb1700",
        capabilities: Capabilities {
            oauth: true,
            webhooks: true,
            live_location: true,
            driver_contact: true,
            session_auth: false,
            order_items: true,
            eta_updates: true,
        },
        poll_intervals: PollIntervals {
            min: 15,
            default: 30,
            max: 300,
        },
        rate_limit: RateLimit {
            max_requests: 60,
            window: std::time::Duration::from_secs(60),
        },
        webhook_scheme: Some(WebhookScheme::TimestampedHmacSha256),
        eta_accuracy_weight: 12,
    },
    AdapterMetadata {
        platform: Platform::UberEats,
        display_name: "Uber Eats",
        color: "#06c167",
        capabilities: Capabilities {
            oauth: true,
            webhooks: true,
            live_location: true,
            driver_contact: true,
            session_auth: false,
            order_items: true,
            eta_updates: true,
        },
        poll_intervals: PollIntervals {
            min: 15,
            default: 30,
            max: 300,
        },
        rate_limit: RateLimit {
            max_requests: 60,
            window: std::time::Duration::from_secs(60),
        },
        webhook_scheme: Some(WebhookScheme::HmacSha256Hex),
        eta_accuracy_weight: 13,
    },
    AdapterMetadata {
        platform: Platform::Grubhub,
        display_name: "Grubhub",
        color: "#ff8000",
        capabilities: Capabilities {
            oauth: true,
            webhooks: false,
            live_location: true,
            driver_contact: false,
            session_auth: false,
            order_items: true,
            eta_updates: true,
        },
        poll_intervals: PollIntervals {
            min: 30,
            default: 60,
            max: 300,
        },
        rate_limit: RateLimit {
            max_requests: 30,
            window: std::time::Duration::from_secs(60),
        },
        webhook_scheme: None,
        eta_accuracy_weight: 9,
    },
    AdapterMetadata {
        platform: Platform::Instacart,
        display_name: "Instacart",
        color: "#0aad0a",
        capabilities: Capabilities {
            oauth: true,
            webhooks: true,
            live_location: true,
            driver_contact: true,
            session_auth: false,
            order_items: true,
            eta_updates: true,
        },
        poll_intervals: PollIntervals {
            min: 30,
            default: 60,
            max: 600,
        },
        rate_limit: RateLimit {
            max_requests: 40,
            window: std::time::Duration::from_secs(60),
        },
        webhook_scheme: Some(WebhookScheme::HmacSha256Base64),
        eta_accuracy_weight: 10,
    },
    AdapterMetadata {
        platform: Platform::Shipt,
        display_name: "Shipt",
        color: "#116c4e",
        capabilities: Capabilities {
            oauth: false,
            webhooks: false,
            live_location: false,
            driver_contact: true,
            session_auth: true,
            order_items: true,
            eta_updates: false,
        },
        poll_intervals: PollIntervals {
            min: 60,
            default: 120,
            max: 900,
        },
        rate_limit: RateLimit {
            max_requests: 20,
            window: std::time::Duration::from_secs(60),
        },
        webhook_scheme: None,
        eta_accuracy_weight: 6,
    },
    AdapterMetadata {
        platform: Platform::Amazon,
        display_name: "Amazon",
        color: "#ff9900",
        capabilities: Capabilities {
            oauth: false,
            webhooks: true,
            live_location: true,
            driver_contact: false,
            session_auth: false,
            order_items: false,
            eta_updates: true,
        },
        poll_intervals: PollIntervals {
            min: 60,
            default: 300,
            max: 1800,
        },
        rate_limit: RateLimit {
            max_requests: 30,
            window: std::time::Duration::from_secs(60),
        },
        webhook_scheme: Some(WebhookScheme::HmacSha256Hex),
        eta_accuracy_weight: 8,
    },
    AdapterMetadata {
        platform: Platform::AmazonFresh,
        display_name: "Amazon Fresh",
        color: "#8bc34a",
        capabilities: Capabilities {
            oauth: false,
            webhooks: true,
            live_location: true,
            driver_contact: false,
            session_auth: false,
            order_items: true,
            eta_updates: true,
        },
        poll_intervals: PollIntervals {
            min: 30,
            default: 120,
            max: 900,
        },
        rate_limit: RateLimit {
            max_requests: 30,
            window: std::time::Duration::from_secs(60),
        },
        webhook_scheme: Some(WebhookScheme::HmacSha256Hex),
        eta_accuracy_weight: 9,
    },
    AdapterMetadata {
        platform: Platform::Costco,
        display_name: "Costco",
        color: "#005daa",
        capabilities: Capabilities {
            oauth: false,
            webhooks: false,
            live_location: true,
            driver_contact: false,
            session_auth: true,
            order_items: true,
            eta_updates: true,
        },
        poll_intervals: PollIntervals {
            min: 60,
            default: 120,
            max: 900,
        },
        rate_limit: RateLimit {
            max_requests: 20,
            window: std::time::Duration::from_secs(60),
        },
        webhook_scheme: None,
        eta_accuracy_weight: 8,
    },
    AdapterMetadata {
        platform: Platform::SamsClub,
        display_name: "Sam's Club",
        color: "#0067a0",
        capabilities: Capabilities {
            oauth: false,
            webhooks: false,
            live_location: false,
            driver_contact: false,
            session_auth: true,
            order_items: true,
            eta_updates: false,
        },
        poll_intervals: PollIntervals {
            min: 60,
            default: 180,
            max: 900,
        },
        rate_limit: RateLimit {
            max_requests: 20,
            window: std::time::Duration::from_secs(60),
        },
        webhook_scheme: None,
        eta_accuracy_weight: 5,
    },
    AdapterMetadata {
        platform: Platform::Drizly,
        display_name: "Drizly",
        color: "#d50032",
        capabilities: Capabilities {
            oauth: true,
            webhooks: true,
            live_location: false,
            driver_contact: true,
            session_auth: false,
            order_items: true,
            eta_updates: true,
        },
        poll_intervals: PollIntervals {
            min: 30,
            default: 60,
            max: 600,
        },
        rate_limit: RateLimit {
            max_requests: 30,
            window: std::time::Duration::from_secs(60),
        },
        webhook_scheme: Some(WebhookScheme::HmacSha256Hex),
        eta_accuracy_weight: 7,
    },
    AdapterMetadata {
        platform: Platform::Saucey,
        display_name: "Saucey",
        color: "#111111",
        capabilities: Capabilities {
            oauth: false,
            webhooks: false,
            live_location: false,
            driver_contact: false,
            session_auth: false,
            order_items: true,
            eta_updates: false,
        },
        poll_intervals: PollIntervals {
            min: 60,
            default: 180,
            max: 900,
        },
        rate_limit: RateLimit {
            max_requests: 15,
            window: std::time::Duration::from_secs(60),
        },
        webhook_scheme: None,
        eta_accuracy_weight: 5,
    },
];
