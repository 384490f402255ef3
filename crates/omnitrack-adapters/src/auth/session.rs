//! Session-cookie credentials for platforms without a public OAuth surface.
//!
//! The client captures a logged-in session's cookies once; adapters replay
//! them as a `Cookie` header. Sessions expire server-side, so the only
//! validation possible locally is an expiry timestamp check — a live probe
//! happens through the adapter's `test_connection`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    /// Full `Cookie` header value, e.g. `"sid=abc; csrf=xyz"`.
    pub cookies: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionCredential {
    #[must_use]
    pub fn new(cookies: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            cookies: cookies.into(),
            expires_at,
        }
    }

    /// Expired if an expiry is known and has passed. Sessions with no known
    /// expiry are assumed live until an upstream 401 says otherwise.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}
