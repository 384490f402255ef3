use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the
/// process, without touching `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build the configuration using the provided env-var lookup function.
///
/// The parsing/validation logic is decoupled from the real environment so
/// tests can drive it with a plain `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let vault_key_hex = require("OMNITRACK_VAULT_KEY")?;
    if vault_key_hex.len() != 64 || !vault_key_hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidEnvVar {
            var: "OMNITRACK_VAULT_KEY".to_string(),
            reason: "expected 64 hex characters (256-bit key)".to_string(),
        });
    }

    let env = parse_environment(&or_default("OMNITRACK_ENV", "development"));
    let log_level = or_default("OMNITRACK_LOG_LEVEL", "info");

    let http_timeout_secs = parse_u64("OMNITRACK_HTTP_TIMEOUT_SECS", "15")?;
    let http_user_agent = or_default(
        "OMNITRACK_HTTP_USER_AGENT",
        "omnitrack/0.1 (delivery-tracking)",
    );
    let max_retries = parse_u32("OMNITRACK_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("OMNITRACK_RETRY_BACKOFF_BASE_MS", "1000")?;
    let rate_limit_fallback_secs = parse_u64("OMNITRACK_RATE_LIMIT_FALLBACK_SECS", "60")?;
    let webhook_dedup_ttl_secs = parse_u64("OMNITRACK_WEBHOOK_DEDUP_TTL_SECS", "600")?;
    let pkce_ttl_secs = parse_u64("OMNITRACK_PKCE_TTL_SECS", "600")?;
    let relay_url = lookup("OMNITRACK_RELAY_URL").ok();
    let relay_api_key = lookup("OMNITRACK_RELAY_API_KEY").ok();

    Ok(AppConfig {
        env,
        log_level,
        vault_key_hex,
        http_timeout_secs,
        http_user_agent,
        max_retries,
        retry_backoff_base_ms,
        rate_limit_fallback_secs,
        webhook_dedup_ttl_secs,
        pkce_ttl_secs,
        relay_url,
        relay_api_key,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
