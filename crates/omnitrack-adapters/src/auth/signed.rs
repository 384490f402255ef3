//! Signed-request authentication: short-lived HS256 bearer JWTs.
//!
//! Minted tokens are cached in the injected [`TtlStore`] keyed by key id, so
//! repeated calls reuse one token until shortly before expiry. An auth
//! failure must call [`SignedRequestAuth::invalidate`] so the next attempt
//! mints a fresh token instead of replaying a known-bad one.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use omnitrack_core::Platform;
use sha2::Sha256;

use crate::error::AdapterError;
use crate::store::TtlStore;

const TOKEN_LIFETIME_SECS: u64 = 300;
/// Cache for slightly less than the token lifetime so a cached token is
/// never presented within its final seconds.
const CACHE_TTL_SECS: u64 = TOKEN_LIFETIME_SECS - 30;

pub struct SignedRequestAuth {
    platform: Platform,
    store: Arc<dyn TtlStore>,
}

impl SignedRequestAuth {
    #[must_use]
    pub fn new(platform: Platform, store: Arc<dyn TtlStore>) -> Self {
        Self { platform, store }
    }

    /// A bearer token for `key_id`, minting and caching one if necessary.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Auth`] if the secret cannot be used as an HMAC key.
    pub async fn bearer_token(&self, key_id: &str, secret: &str) -> Result<String, AdapterError> {
        let cache_key = self.cache_key(key_id);
        if let Some(token) = self.store.get(&cache_key).await {
            return Ok(token);
        }
        let token = self.mint(key_id, secret, chrono::Utc::now().timestamp())?;
        self.store
            .put(
                &cache_key,
                token.clone(),
                Duration::from_secs(CACHE_TTL_SECS),
            )
            .await;
        Ok(token)
    }

    /// Drop the cached token for `key_id`. Called on any auth failure so the
    /// next request re-derives credentials.
    pub async fn invalidate(&self, key_id: &str) {
        self.store.remove(&self.cache_key(key_id)).await;
    }

    /// Mint an HS256 JWT: `{"alg":"HS256","typ":"JWT","kid":...}` header,
    /// `iss`/`iat`/`exp` claims, base64url segments.
    fn mint(&self, key_id: &str, secret: &str, issued_at: i64) -> Result<String, AdapterError> {
        #[allow(clippy::cast_possible_wrap)]
        let exp = issued_at + TOKEN_LIFETIME_SECS as i64;
        let header = serde_json::json!({ "alg": "HS256", "typ": "JWT", "kid": key_id });
        let claims = serde_json::json!({
            "iss": key_id,
            "iat": issued_at,
            "exp": exp,
        });
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );
        let mut mac =
            Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| AdapterError::Auth {
                platform: self.platform,
                reason: "invalid signing secret".to_owned(),
            })?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{signing_input}.{signature}"))
    }

    fn cache_key(&self, key_id: &str) -> String {
        format!("signed_token:{}:{key_id}", self.platform)
    }
}
