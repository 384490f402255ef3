//! Canonical delivery model shared by every adapter and consumer.
//!
//! Everything upstream-specific stays inside `omnitrack-adapters`; the types
//! here are the only vocabulary the rest of the system speaks.

pub mod app_config;
pub mod config;
pub mod delivery;
pub mod geo;
pub mod ids;
pub mod mask;
pub mod platform;
pub mod status;
pub mod timeparse;
pub mod webhook;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use delivery::{
    DeliveryMeta, Destination, DriverInfo, DriverLocation, EtaInfo, FetchOrigin, LifecycleEvent,
    OrderInfo, OrderItem, TrackingInfo, UnifiedDelivery,
};
pub use ids::derive_delivery_id;
pub use platform::{OrderCategory, Platform};
pub use status::DeliveryStatus;
pub use webhook::{DeliveryDelta, NormalizedWebhook, WebhookPayload};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
