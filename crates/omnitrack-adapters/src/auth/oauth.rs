//! OAuth2 authorization-code flow (with optional PKCE parameters).

use chrono::{DateTime, Duration, Utc};
use omnitrack_core::Platform;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::AdapterError;
use crate::http::check_status;

/// Static endpoint/client configuration for one platform's OAuth setup.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

/// Token endpoint response, normalized to absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl From<TokenResponse> for TokenSet {
    fn from(raw: TokenResponse) -> Self {
        TokenSet {
            access_token: raw.access_token,
            refresh_token: raw.refresh_token,
            expires_at: raw.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

/// OAuth2 client for one platform. Token endpoint calls authenticate with
/// HTTP basic auth (client id/secret), form-encoded bodies.
pub struct OAuthClient {
    platform: Platform,
    http: Client,
    config: OAuthConfig,
    rate_limit_fallback_secs: u64,
}

impl OAuthClient {
    #[must_use]
    pub fn new(
        platform: Platform,
        http: Client,
        config: OAuthConfig,
        rate_limit_fallback_secs: u64,
    ) -> Self {
        Self {
            platform,
            http,
            config,
            rate_limit_fallback_secs,
        }
    }

    /// Build the user-facing authorization URL for `state`, appending the
    /// PKCE challenge parameters when the platform requires them.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Data`] if the configured authorize URL is
    /// unparseable.
    pub fn authorize_url(
        &self,
        state: &str,
        pkce_challenge: Option<&str>,
    ) -> Result<String, AdapterError> {
        let mut url = Url::parse(&self.config.authorize_url).map_err(|e| AdapterError::Data {
            context: format!("{} authorize URL", self.platform),
            reason: e.to_string(),
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("client_id", &self.config.client_id);
            pairs.append_pair("redirect_uri", &self.config.redirect_uri);
            pairs.append_pair("response_type", "code");
            pairs.append_pair("state", state);
            if !self.config.scopes.is_empty() {
                pairs.append_pair("scope", &self.config.scopes.join(" "));
            }
            if let Some(challenge) = pkce_challenge {
                pairs.append_pair("code_challenge", challenge);
                pairs.append_pair("code_challenge_method", "S256");
            }
        }
        Ok(url.into())
    }

    /// Exchange an authorization code for a token set. `pkce_verifier` must
    /// be supplied iff the authorize URL carried a challenge.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::Auth`] if the platform rejects the code.
    /// - [`AdapterError::Network`] on transport failure.
    /// - [`AdapterError::Data`] if the token response has an unexpected shape.
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<TokenSet, AdapterError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        if let Some(verifier) = pkce_verifier {
            form.push(("code_verifier", verifier));
        }
        self.token_request(&form, "exchange_code").await
    }

    /// Redeem a refresh token for a fresh token set.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::Auth`] if the refresh token has been revoked.
    /// - [`AdapterError::Network`] on transport failure.
    /// - [`AdapterError::Data`] if the token response has an unexpected shape.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AdapterError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.token_request(&form, "refresh_token").await
    }

    /// Revoke a token at the platform. Best effort: a 2xx or the platform's
    /// standard revocation endpoint errors both complete the operation.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Network`] on transport failure only; HTTP-level
    /// rejection of an already-dead token is treated as success.
    pub async fn revoke_token(&self, token: &str) -> Result<(), AdapterError> {
        let revoke_url = format!("{}/revoke", self.config.token_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&revoke_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("token", token)])
            .send()
            .await?;
        tracing::debug!(platform = %self.platform, status = %response.status(), "token revocation");
        Ok(())
    }

    async fn token_request(
        &self,
        form: &[(&str, &str)],
        context: &str,
    ) -> Result<TokenSet, AdapterError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .await?;
        let response = check_status(self.platform, response, self.rate_limit_fallback_secs)
            .map_err(|err| match err {
                // Token endpoints answer 400/401 for bad grants; both mean
                // the credential is dead.
                AdapterError::Data { .. } | AdapterError::Auth { .. } => AdapterError::Auth {
                    platform: self.platform,
                    reason: format!("{context} rejected"),
                },
                other => other,
            })?;
        let body = response.text().await?;
        let raw: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AdapterError::deserialize(
                format!("{} {context}", self.platform),
                &e,
            ))?;
        Ok(raw.into())
    }
}
