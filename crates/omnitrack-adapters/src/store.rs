//! Shared TTL-bearing key/value store.
//!
//! Holds short-lived auth material that must not live inside adapter
//! instances: PKCE verifiers keyed by OAuth state, cached signed-request
//! tokens, and webhook idempotency markers. The trait is async so a
//! deployment can back it with a store reachable from every process
//! instance; the bundled [`MemoryTtlStore`] is single-process only.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Pluggable TTL store. Implementations must be safe for concurrent use.
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Store `value` under `key`, expiring after `ttl`. Overwrites any
    /// existing entry and resets its TTL.
    async fn put(&self, key: &str, value: String, ttl: Duration);

    /// Fetch the live value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Option<String>;

    /// Remove `key`. No-op if absent.
    async fn remove(&self, key: &str);

    /// Atomically store `value` only if `key` has no live entry. Returns
    /// `true` if the value was stored — the idempotency primitive.
    async fn put_if_absent(&self, key: &str, value: String, ttl: Duration) -> bool;
}

/// In-memory `TtlStore`. Expired entries are dropped lazily on access and
/// swept opportunistically on writes.
#[derive(Default)]
pub struct MemoryTtlStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryTtlStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sweep(entries: &mut HashMap<String, (String, Instant)>) {
        let now = Instant::now();
        entries.retain(|_, (_, expires)| *expires > now);
    }
}

#[async_trait]
impl TtlStore for MemoryTtlStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) {
        let mut entries = self.entries.lock().expect("ttl store lock poisoned");
        Self::sweep(&mut entries);
        entries.insert(key.to_owned(), (value, Instant::now() + ttl));
    }

    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().expect("ttl store lock poisoned");
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().expect("ttl store lock poisoned");
        entries.remove(key);
    }

    async fn put_if_absent(&self, key: &str, value: String, ttl: Duration) -> bool {
        let mut entries = self.entries.lock().expect("ttl store lock poisoned");
        Self::sweep(&mut entries);
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_owned(), (value, Instant::now() + ttl));
        true
    }
}
