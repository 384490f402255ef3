//! PKCE verifier/challenge generation and storage.
//!
//! Verifiers live in the injected [`TtlStore`] keyed by OAuth `state`, not
//! in adapter instances, so a callback can land on any process that shares
//! the store.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::store::TtlStore;

/// A freshly generated verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a 32-byte random verifier (base64url, 43 chars) and its
    /// SHA-256 challenge.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// TTL-backed verifier storage keyed by OAuth state.
pub struct PkceVerifiers {
    store: Arc<dyn TtlStore>,
    ttl: Duration,
}

impl PkceVerifiers {
    #[must_use]
    pub fn new(store: Arc<dyn TtlStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Stash `verifier` under `state` until the callback arrives.
    pub async fn put(&self, state: &str, verifier: &str) {
        self.store
            .put(&Self::key(state), verifier.to_owned(), self.ttl)
            .await;
    }

    /// Retrieve and consume the verifier for `state`. One-shot: a second
    /// call for the same state returns `None`.
    pub async fn take(&self, state: &str) -> Option<String> {
        let key = Self::key(state);
        let verifier = self.store.get(&key).await?;
        self.store.remove(&key).await;
        Some(verifier)
    }

    fn key(state: &str) -> String {
        format!("pkce:{state}")
    }
}
