use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    /// 64 hex chars — the 256-bit credential vault key.
    pub vault_key_hex: String,
    pub http_timeout_secs: u64,
    pub http_user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    /// Fallback retry-after when an upstream 429 carries no header.
    pub rate_limit_fallback_secs: u64,
    pub webhook_dedup_ttl_secs: u64,
    pub pkce_ttl_secs: u64,
    /// External realtime relay endpoint; `None` disables the relay leg.
    pub relay_url: Option<String>,
    pub relay_api_key: Option<String>,
}

impl AppConfig {
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("vault_key_hex", &"[redacted]")
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("http_user_agent", &self.http_user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("rate_limit_fallback_secs", &self.rate_limit_fallback_secs)
            .field("webhook_dedup_ttl_secs", &self.webhook_dedup_ttl_secs)
            .field("pkce_ttl_secs", &self.pkce_ttl_secs)
            .field("relay_url", &self.relay_url)
            .field(
                "relay_api_key",
                &self.relay_api_key.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}
