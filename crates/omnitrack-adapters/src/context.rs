//! Shared per-process dependencies handed to every adapter.

use std::sync::Arc;

use omnitrack_core::AppConfig;

use crate::error::AdapterError;
use crate::http::build_client;
use crate::rate_limit::{MemoryCounterStore, RateLimiter};
use crate::store::{MemoryTtlStore, TtlStore};

/// Everything an adapter needs beyond its own endpoints: the HTTP client,
/// the rate-limit gate, the shared TTL store, and retry policy knobs. Cheap
/// to clone; all heavy members are shared handles.
#[derive(Clone)]
pub struct AdapterContext {
    pub http: reqwest::Client,
    pub limiter: Arc<RateLimiter>,
    pub ttl_store: Arc<dyn TtlStore>,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub rate_limit_fallback_secs: u64,
    pub pkce_ttl_secs: u64,
}

impl AdapterContext {
    /// Build a context from application config with in-memory counter and
    /// TTL stores. Multi-instance deployments construct the context with
    /// shared store implementations instead.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Network`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, AdapterError> {
        let http = build_client(config.http_timeout_secs, &config.http_user_agent)?;
        Ok(Self {
            http,
            limiter: Arc::new(RateLimiter::new(
                Arc::new(MemoryCounterStore::new()),
                config.rate_limit_fallback_secs,
            )),
            ttl_store: Arc::new(MemoryTtlStore::new()),
            max_retries: config.max_retries,
            backoff_base_ms: config.retry_backoff_base_ms,
            rate_limit_fallback_secs: config.rate_limit_fallback_secs,
            pkce_ttl_secs: config.pkce_ttl_secs,
        })
    }

    /// Context with in-memory stores and no retries, for adapter unit tests.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            http: reqwest::Client::new(),
            limiter: Arc::new(RateLimiter::new(Arc::new(MemoryCounterStore::new()), 60)),
            ttl_store: Arc::new(MemoryTtlStore::new()),
            max_retries: 0,
            backoff_base_ms: 1,
            rate_limit_fallback_secs: 60,
            pkce_ttl_secs: 600,
        }
    }
}
