//! Lazy adapter directory with single-flight instantiation.
//!
//! Factories are registered up front; the first caller for a platform
//! triggers construction and concurrent callers share the one in-flight
//! future, so at most one adapter instance exists per platform. The
//! registry is an explicit constructed dependency — build it at process
//! start and pass it down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use omnitrack_core::Platform;

use crate::adapter::PlatformAdapter;
use crate::error::AdapterError;

type AdapterResult = Result<Arc<dyn PlatformAdapter>, Arc<AdapterError>>;
type LoadingFuture = Shared<BoxFuture<'static, AdapterResult>>;

type Factory =
    Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn PlatformAdapter>, AdapterError>> + Send + Sync>;

enum Entry {
    Ready(Arc<dyn PlatformAdapter>),
    /// An in-flight construction, tagged so a caller that joined it can tell
    /// it apart from any construction started after it.
    Loading {
        generation: u64,
        future: LoadingFuture,
    },
}

#[derive(Default)]
pub struct AdapterRegistry {
    factories: HashMap<Platform, Factory>,
    entries: Mutex<HashMap<Platform, Entry>>,
    next_generation: AtomicU64,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for `platform`. Construction is deferred until
    /// the first [`AdapterRegistry::get`].
    pub fn register<F, Fut>(&mut self, platform: Platform, factory: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Arc<dyn PlatformAdapter>, AdapterError>>
            + Send
            + 'static,
    {
        self.factories
            .insert(platform, Box::new(move || factory().boxed()));
    }

    /// The adapter for `platform`, constructing it on first use.
    ///
    /// Concurrent callers during construction await the same in-flight
    /// future. A failed construction clears the in-flight entry so the next
    /// caller retries.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::Unsupported`] if no factory is registered.
    /// - Whatever the factory returned, re-surfaced as [`AdapterError::Data`]
    ///   for callers that joined a shared failed construction.
    pub async fn get(&self, platform: Platform) -> Result<Arc<dyn PlatformAdapter>, AdapterError> {
        let (generation, future) = {
            let mut entries = self.entries.lock().expect("registry lock poisoned");
            match entries.get(&platform) {
                Some(Entry::Ready(adapter)) => return Ok(Arc::clone(adapter)),
                Some(Entry::Loading { generation, future }) => (*generation, future.clone()),
                None => {
                    let Some(factory) = self.factories.get(&platform) else {
                        return Err(AdapterError::Unsupported {
                            platform,
                            capability: "registered adapter",
                        });
                    };
                    tracing::debug!(%platform, "constructing adapter");
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let future: LoadingFuture =
                        factory().map(|result| result.map_err(Arc::new)).boxed().shared();
                    entries.insert(
                        platform,
                        Entry::Loading {
                            generation,
                            future: future.clone(),
                        },
                    );
                    (generation, future)
                }
            }
        };

        let mine = |entry: Option<&Entry>| {
            matches!(entry, Some(Entry::Loading { generation: g, .. }) if *g == generation)
        };

        match future.await {
            Ok(adapter) => {
                let mut entries = self.entries.lock().expect("registry lock poisoned");
                if mine(entries.get(&platform)) {
                    entries.insert(platform, Entry::Ready(Arc::clone(&adapter)));
                }
                Ok(adapter)
            }
            Err(err) => {
                // Only evict the construction this caller joined; a newer
                // in-flight one belongs to somebody else.
                let mut entries = self.entries.lock().expect("registry lock poisoned");
                if mine(entries.get(&platform)) {
                    entries.remove(&platform);
                }
                Err(AdapterError::Data {
                    context: format!("{platform} adapter construction"),
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Drop `platform`'s instance and any in-flight construction. The next
    /// `get` starts fresh from the factory.
    pub fn unregister(&self, platform: Platform) {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        entries.remove(&platform);
    }

    /// Platforms with a registered factory.
    #[must_use]
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.factories.keys().copied().collect();
        platforms.sort_by_key(|p| p.id_prefix());
        platforms
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use omnitrack_core::{DeliveryStatus, UnifiedDelivery};

    use super::*;
    use crate::adapter::AdapterConnection;

    struct FakeAdapter {
        platform: Platform,
    }

    #[async_trait]
    impl PlatformAdapter for FakeAdapter {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn get_active_deliveries(
            &self,
            _connection: &AdapterConnection,
        ) -> Result<Vec<UnifiedDelivery>, AdapterError> {
            Ok(vec![])
        }

        async fn get_delivery_details(
            &self,
            _connection: &AdapterConnection,
            delivery_id: &str,
        ) -> Result<UnifiedDelivery, AdapterError> {
            Err(AdapterError::Data {
                context: delivery_id.to_owned(),
                reason: "not found".to_owned(),
            })
        }

        fn map_status(&self, _raw: &str) -> DeliveryStatus {
            DeliveryStatus::Preparing
        }
    }

    #[tokio::test]
    async fn constructs_lazily_and_exactly_once() {
        static CONSTRUCTIONS: AtomicU32 = AtomicU32::new(0);
        let mut registry = AdapterRegistry::new();
        registry.register(Platform::Doordash, || async {
            CONSTRUCTIONS.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeAdapter {
                platform: Platform::Doordash,
            }) as Arc<dyn PlatformAdapter>)
        });

        assert_eq!(CONSTRUCTIONS.load(Ordering::SeqCst), 0, "lazy until first get");
        let registry = Arc::new(registry);

        let a = Arc::clone(&registry);
        let b = Arc::clone(&registry);
        let (ra, rb) = tokio::join!(
            a.get(Platform::Doordash),
            b.get(Platform::Doordash)
        );
        assert!(ra.is_ok() && rb.is_ok());
        assert_eq!(CONSTRUCTIONS.load(Ordering::SeqCst), 1);

        registry.get(Platform::Doordash).await.unwrap();
        assert_eq!(CONSTRUCTIONS.load(Ordering::SeqCst), 1, "instance is cached");
    }

    #[tokio::test]
    async fn unknown_platform_is_unsupported() {
        let registry = AdapterRegistry::new();
        let err = registry.get(Platform::Saucey).await.err().unwrap();
        assert!(matches!(err, AdapterError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn failed_construction_is_retried_on_next_get() {
        static ATTEMPTS: AtomicU32 = AtomicU32::new(0);
        let mut registry = AdapterRegistry::new();
        registry.register(Platform::Shipt, || async {
            let n = ATTEMPTS.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(AdapterError::Data {
                    context: "construction".to_owned(),
                    reason: "boom".to_owned(),
                })
            } else {
                Ok(Arc::new(FakeAdapter {
                    platform: Platform::Shipt,
                }) as Arc<dyn PlatformAdapter>)
            }
        });

        assert!(registry.get(Platform::Shipt).await.is_err());
        assert!(registry.get(Platform::Shipt).await.is_ok());
        assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_joiner_leaves_a_newer_construction_in_place() {
        use tokio::sync::Notify;

        let attempts = Arc::new(AtomicU32::new(0));
        let first_gate = Arc::new(Notify::new());
        let second_gate = Arc::new(Notify::new());

        let mut registry = AdapterRegistry::new();
        {
            let attempts = Arc::clone(&attempts);
            let first_gate = Arc::clone(&first_gate);
            let second_gate = Arc::clone(&second_gate);
            registry.register(Platform::Amazon, move || {
                let attempts = Arc::clone(&attempts);
                let first_gate = Arc::clone(&first_gate);
                let second_gate = Arc::clone(&second_gate);
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        first_gate.notified().await;
                        Err(AdapterError::Data {
                            context: "construction".to_owned(),
                            reason: "boom".to_owned(),
                        })
                    } else {
                        second_gate.notified().await;
                        Ok(Arc::new(FakeAdapter {
                            platform: Platform::Amazon,
                        }) as Arc<dyn PlatformAdapter>)
                    }
                }
            });
        }

        // First caller starts the construction and parks on the gate; it
        // will not observe the failure until polled again.
        let late = registry.get(Platform::Amazon);
        futures::pin_mut!(late);
        assert!(futures::poll!(late.as_mut()).is_pending());

        // A second caller joins the same construction, sees it fail, and
        // evicts it.
        first_gate.notify_one();
        assert!(registry.get(Platform::Amazon).await.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        // A retry starts a fresh construction and parks on its gate.
        let fresh = registry.get(Platform::Amazon);
        futures::pin_mut!(fresh);
        assert!(futures::poll!(fresh.as_mut()).is_pending());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        // The stale first caller now observes the old failure. It must not
        // evict the fresh in-flight construction.
        assert!(late.await.is_err());
        let joiner = registry.get(Platform::Amazon);
        futures::pin_mut!(joiner);
        assert!(futures::poll!(joiner.as_mut()).is_pending());
        assert_eq!(attempts.load(Ordering::SeqCst), 2, "joiner shares the fresh construction");

        second_gate.notify_one();
        assert!(fresh.await.is_ok());
        assert!(joiner.await.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unregister_clears_the_cached_instance() {
        static CONSTRUCTIONS: AtomicU32 = AtomicU32::new(0);
        let mut registry = AdapterRegistry::new();
        registry.register(Platform::Drizly, || async {
            CONSTRUCTIONS.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeAdapter {
                platform: Platform::Drizly,
            }) as Arc<dyn PlatformAdapter>)
        });

        registry.get(Platform::Drizly).await.unwrap();
        registry.unregister(Platform::Drizly);
        registry.get(Platform::Drizly).await.unwrap();
        assert_eq!(CONSTRUCTIONS.load(Ordering::SeqCst), 2);
    }
}
