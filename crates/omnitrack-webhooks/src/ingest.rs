//! Webhook ingestion pipeline: verify, deduplicate, normalize.

use std::sync::Arc;
use std::time::Duration;

use omnitrack_adapters::{AdapterError, PlatformAdapter, TtlStore};
use omnitrack_core::webhook::{NormalizedWebhook, WebhookPayload};
use omnitrack_core::Platform;

use crate::verify::verify_signature;

/// Outcome of one webhook delivery.
#[derive(Debug)]
pub enum IngestOutcome {
    /// First sight of this event; carries the normalization result.
    Processed(NormalizedWebhook),
    /// `(platform, event_id)` was already seen within the dedup TTL. A
    /// silent no-op from the sender's perspective.
    Duplicate,
}

/// The ingestion front door for push-capable platforms.
///
/// Dedup state lives in the injected [`TtlStore`], so replays land on any
/// process instance that shares the store.
pub struct WebhookIngestor {
    dedup: Arc<dyn TtlStore>,
    dedup_ttl: Duration,
}

impl WebhookIngestor {
    #[must_use]
    pub fn new(dedup: Arc<dyn TtlStore>, dedup_ttl: Duration) -> Self {
        Self { dedup, dedup_ttl }
    }

    /// Run the full pipeline for one delivery.
    ///
    /// `raw_body` is the exact bytes the platform signed — signature checks
    /// must never run against a re-serialized payload.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::Unsupported`] when the adapter has no webhook
    ///   capability.
    /// - [`AdapterError::WebhookInvalid`] when the signature is missing or
    ///   fails verification; nothing else happens with the payload.
    /// - Whatever the adapter's normalization raises for a verified but
    ///   malformed body.
    pub async fn ingest(
        &self,
        adapter: &dyn PlatformAdapter,
        secret: &[u8],
        raw_body: &[u8],
        timestamp_header: Option<&str>,
        payload: &WebhookPayload,
    ) -> Result<IngestOutcome, AdapterError> {
        let platform = adapter.platform();
        let Some(scheme) = adapter.metadata().webhook_scheme else {
            return Err(AdapterError::Unsupported {
                platform,
                capability: "webhooks",
            });
        };

        let verified = payload.signature.as_deref().is_some_and(|signature| {
            verify_signature(scheme, secret, raw_body, timestamp_header, signature)
        });
        if !verified {
            tracing::warn!(%platform, event_id = %payload.event_id, "webhook signature rejected");
            return Err(AdapterError::WebhookInvalid { platform });
        }

        let first_sight = self
            .dedup
            .put_if_absent(
                &Self::dedup_key(platform, &payload.event_id),
                String::new(),
                self.dedup_ttl,
            )
            .await;
        if !first_sight {
            tracing::debug!(%platform, event_id = %payload.event_id, "duplicate webhook dropped");
            return Ok(IngestOutcome::Duplicate);
        }

        Ok(IngestOutcome::Processed(adapter.normalize_webhook(payload)?))
    }

    fn dedup_key(platform: Platform, event_id: &str) -> String {
        format!("webhook:{platform}:{event_id}")
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use hmac::{Hmac, Mac};
    use omnitrack_adapters::{AdapterConnection, MemoryTtlStore};
    use omnitrack_core::{DeliveryStatus, UnifiedDelivery};
    use sha2::Sha256;

    use super::*;

    struct PushAdapter;

    #[async_trait]
    impl PlatformAdapter for PushAdapter {
        fn platform(&self) -> Platform {
            Platform::UberEats
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

        fn normalize_webhook(
            &self,
            _payload: &WebhookPayload,
        ) -> Result<NormalizedWebhook, AdapterError> {
            Ok(NormalizedWebhook::Insufficient)
        }
    }

    struct PollOnlyAdapter;

    #[async_trait]
    impl PlatformAdapter for PollOnlyAdapter {
        fn platform(&self) -> Platform {
            Platform::Shipt
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

    const SECRET: &[u8] = b"whsec_test";
    const BODY: &[u8] = br#"{"order_id":"1"}"#;

    fn signed_payload(event_id: &str) -> WebhookPayload {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET).unwrap();
        mac.update(BODY);
        WebhookPayload {
            platform: Platform::UberEats,
            event_type: "orders.status_update".to_owned(),
            event_id: event_id.to_owned(),
            timestamp: Utc::now(),
            data: serde_json::json!({}),
            signature: Some(hex::encode(mac.finalize().into_bytes())),
        }
    }

    fn ingestor() -> WebhookIngestor {
        WebhookIngestor::new(Arc::new(MemoryTtlStore::new()), Duration::from_secs(600))
    }

    #[tokio::test]
    async fn valid_delivery_is_processed_once() {
        let ingestor = ingestor();
        let payload = signed_payload("evt-1");

        let first = ingestor
            .ingest(&PushAdapter, SECRET, BODY, None, &payload)
            .await
            .unwrap();
        assert!(matches!(first, IngestOutcome::Processed(_)));

        let replay = ingestor
            .ingest(&PushAdapter, SECRET, BODY, None, &payload)
            .await
            .unwrap();
        assert!(matches!(replay, IngestOutcome::Duplicate));
    }

    #[tokio::test]
    async fn distinct_event_ids_both_process() {
        let ingestor = ingestor();
        for id in ["evt-a", "evt-b"] {
            let outcome = ingestor
                .ingest(&PushAdapter, SECRET, BODY, None, &signed_payload(id))
                .await
                .unwrap();
            assert!(matches!(outcome, IngestOutcome::Processed(_)));
        }
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_before_dedup() {
        let ingestor = ingestor();
        let mut payload = signed_payload("evt-1");
        payload.signature = Some("00".repeat(32));

        let err = ingestor
            .ingest(&PushAdapter, SECRET, BODY, None, &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::WebhookInvalid { .. }));

        // The failed delivery must not consume the idempotency slot.
        let good = ingestor
            .ingest(&PushAdapter, SECRET, BODY, None, &signed_payload("evt-1"))
            .await
            .unwrap();
        assert!(matches!(good, IngestOutcome::Processed(_)));
    }

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let ingestor = ingestor();
        let mut payload = signed_payload("evt-1");
        payload.signature = None;
        let err = ingestor
            .ingest(&PushAdapter, SECRET, BODY, None, &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::WebhookInvalid { .. }));
    }

    #[tokio::test]
    async fn poll_only_platform_is_unsupported() {
        let ingestor = ingestor();
        let payload = signed_payload("evt-1");
        let err = ingestor
            .ingest(&PollOnlyAdapter, SECRET, BODY, None, &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Unsupported { .. }));
    }
}
