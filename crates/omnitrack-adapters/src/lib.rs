//! Platform adapters: one trait, eleven delivery platforms.
//!
//! Each adapter pairs an HTTP client with one auth strategy and a
//! normalization function that maps platform payloads onto
//! [`omnitrack_core::UnifiedDelivery`]. The [`registry::AdapterRegistry`]
//! constructs adapters lazily and hands out shared instances.

pub mod adapter;
pub mod auth;
pub mod context;
pub mod error;
pub mod http;
pub mod platforms;
pub mod rate_limit;
pub mod registry;
pub mod retry;
pub mod store;

pub use adapter::{
    AdapterConnection, AdapterMetadata, Capabilities, PlatformAdapter, PollIntervals,
    WebhookScheme,
};
pub use auth::{Credential, OAuthConfig, TokenSet};
pub use context::AdapterContext;
pub use error::AdapterError;
pub use platforms::{build_default_registry, OAuthConfigs};
pub use rate_limit::{CounterStore, MemoryCounterStore, RateLimit, RateLimiter};
pub use registry::AdapterRegistry;
pub use store::{MemoryTtlStore, TtlStore};
