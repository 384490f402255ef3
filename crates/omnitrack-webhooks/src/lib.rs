//! Webhook front door: signature verification, idempotency, normalization.
//!
//! Sits in front of the push-capable adapters. A delivery is verified
//! against the platform's signing scheme, deduplicated by
//! `(platform, event_id)` against a short-TTL store, and only then handed
//! to the adapter's webhook normalization.

pub mod ingest;
pub mod verify;

pub use ingest::{IngestOutcome, WebhookIngestor};
pub use verify::verify_signature;
