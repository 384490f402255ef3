//! Authentication strategies.
//!
//! Four variants cover every supported platform: OAuth2 authorization-code,
//! OAuth2 with PKCE, signed-request (HS256 bearer JWT), and session-cookie
//! capture. An adapter composes exactly one of these; the choice is
//! configuration, not subclassing.

pub mod oauth;
pub mod pkce;
pub mod session;
pub mod signed;

use chrono::{DateTime, Utc};
use omnitrack_core::Platform;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

pub use oauth::{OAuthClient, OAuthConfig, TokenSet};
pub use pkce::{PkceChallenge, PkceVerifiers};
pub use session::SessionCredential;
pub use signed::SignedRequestAuth;

/// A decrypted credential, ready for one request. The vault stores the
/// serialized form encrypted at rest; this enum never persists as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credential {
    OAuth {
        access_token: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        refresh_token: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        expires_at: Option<DateTime<Utc>>,
    },
    Session(SessionCredential),
    Signed {
        key_id: String,
        secret: String,
    },
}

impl From<SessionCredential> for Credential {
    fn from(session: SessionCredential) -> Self {
        Credential::Session(session)
    }
}

impl Credential {
    /// The OAuth access token, or an auth error naming the mismatch. Used by
    /// adapters whose strategy is OAuth (with or without PKCE).
    ///
    /// # Errors
    ///
    /// [`AdapterError::Auth`] when the credential is not an OAuth token set.
    pub fn oauth_access_token(&self, platform: Platform) -> Result<&str, AdapterError> {
        match self {
            Credential::OAuth { access_token, .. } => Ok(access_token),
            _ => Err(AdapterError::Auth {
                platform,
                reason: "expected an OAuth credential".to_owned(),
            }),
        }
    }

    /// The session cookie header value, or an auth error.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Auth`] when the credential is not a session capture,
    /// or the session has expired.
    pub fn session_cookies(&self, platform: Platform) -> Result<&str, AdapterError> {
        match self {
            Credential::Session(session) => {
                if session.is_expired() {
                    return Err(AdapterError::Auth {
                        platform,
                        reason: "session expired".to_owned(),
                    });
                }
                Ok(&session.cookies)
            }
            _ => Err(AdapterError::Auth {
                platform,
                reason: "expected a session credential".to_owned(),
            }),
        }
    }

    /// The signing key pair, or an auth error.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Auth`] when the credential is not a signing key.
    pub fn signing_key(&self, platform: Platform) -> Result<(&str, &str), AdapterError> {
        match self {
            Credential::Signed { key_id, secret } => Ok((key_id, secret)),
            _ => Err(AdapterError::Auth {
                platform,
                reason: "expected a signed-request credential".to_owned(),
            }),
        }
    }
}
