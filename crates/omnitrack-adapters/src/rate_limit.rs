//! Per-platform request gate.
//!
//! A token-bucket limiter consulted before every outbound call. Counts live
//! behind the [`CounterStore`] trait so horizontally scaled deployments can
//! share one set of buckets; the bundled [`MemoryCounterStore`] covers a
//! single process.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use omnitrack_core::Platform;

use crate::error::AdapterError;

/// Shared counter backing the limiter. `incr` returns the count for `key`
/// within the current fixed window, after incrementing.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn incr(&self, key: &str, window: Duration) -> u32;
}

/// In-memory counter store: one `(window_start, count)` pair per key.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, (Instant, u32)>>,
}

impl MemoryCounterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str, window: Duration) -> u32 {
        let mut counters = self.counters.lock().expect("counter store lock poisoned");
        let now = Instant::now();
        let entry = counters.entry(key.to_owned()).or_insert((now, 0));
        if now.duration_since(entry.0) >= window {
            *entry = (now, 0);
        }
        entry.1 += 1;
        entry.1
    }
}

/// Requests allowed per window for a platform. The defaults are deliberately
/// conservative; upstream 429s still take precedence via the error taxonomy.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimit {
    #[must_use]
    pub fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }
}

/// Token-bucket gate over a [`CounterStore`].
pub struct RateLimiter {
    store: std::sync::Arc<dyn CounterStore>,
    /// Advertised wait when the local bucket is exhausted.
    fallback_retry_after_secs: u64,
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: std::sync::Arc<dyn CounterStore>, fallback_retry_after_secs: u64) -> Self {
        Self {
            store,
            fallback_retry_after_secs,
        }
    }

    /// Take one token from `platform`'s bucket.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::RateLimited`] with a positive retry-after when
    /// the bucket is exhausted for the current window.
    pub async fn check(&self, platform: Platform, limit: RateLimit) -> Result<(), AdapterError> {
        let key = format!("ratelimit:{platform}");
        let count = self.store.incr(&key, limit.window).await;
        if count > limit.max_requests {
            tracing::warn!(%platform, count, max = limit.max_requests, "rate limit exceeded");
            return Err(AdapterError::RateLimited {
                platform,
                retry_after_secs: self.fallback_retry_after_secs.max(1),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_the_bucket_size() {
        let limiter = RateLimiter::new(std::sync::Arc::new(MemoryCounterStore::new()), 60);
        let limit = RateLimit::per_minute(3);
        for _ in 0..3 {
            limiter.check(Platform::Doordash, limit).await.unwrap();
        }
    }

    #[tokio::test]
    async fn exceeding_the_bucket_is_rate_limited_with_positive_retry_after() {
        let limiter = RateLimiter::new(std::sync::Arc::new(MemoryCounterStore::new()), 60);
        let limit = RateLimit::per_minute(2);
        limiter.check(Platform::Grubhub, limit).await.unwrap();
        limiter.check(Platform::Grubhub, limit).await.unwrap();
        let err = limiter.check(Platform::Grubhub, limit).await.unwrap_err();
        match err {
            AdapterError::RateLimited {
                platform,
                retry_after_secs,
            } => {
                assert_eq!(platform, Platform::Grubhub);
                assert!(retry_after_secs > 0);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn buckets_are_per_platform() {
        let limiter = RateLimiter::new(std::sync::Arc::new(MemoryCounterStore::new()), 60);
        let limit = RateLimit::per_minute(1);
        limiter.check(Platform::Doordash, limit).await.unwrap();
        // A different platform has its own bucket.
        limiter.check(Platform::UberEats, limit).await.unwrap();
        assert!(limiter.check(Platform::Doordash, limit).await.is_err());
    }

    #[tokio::test]
    async fn window_rollover_resets_the_count() {
        let limiter = RateLimiter::new(std::sync::Arc::new(MemoryCounterStore::new()), 60);
        let limit = RateLimit {
            max_requests: 1,
            window: Duration::ZERO,
        };
        limiter.check(Platform::Saucey, limit).await.unwrap();
        // Zero-length window: every call starts a fresh window.
        limiter.check(Platform::Saucey, limit).await.unwrap();
    }
}
