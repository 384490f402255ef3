//! Retry with exponential backoff for adapter operations.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries only
//! errors the taxonomy flags retryable. Auth and data-shape errors are
//! returned immediately. When an error carries an explicit retry-after (rate
//! limits), that wait replaces the computed backoff delay.

use std::future::Future;
use std::time::Duration;

use crate::error::AdapterError;

const MAX_DELAY_MS: u64 = 60_000;

/// Runs `operation` with up to `max_retries` additional attempts on
/// retryable errors.
///
/// Backoff schedule with `backoff_base_ms = 1_000`:
///
/// | Attempt | Sleep before next attempt |
/// |---------|---------------------------|
/// | 1       | 1 000 ms × 2⁰             |
/// | 2       | 1 000 ms × 2¹             |
/// | 3       | 1 000 ms × 2²             |
///
/// Delay is capped at 60 s. An error-supplied `retry_after_secs` overrides
/// the computed delay for that attempt. Non-retryable errors are returned
/// immediately without sleeping.
pub async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.retryable() || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms
                    .saturating_mul(1u64 << (attempt - 1).min(10))
                    .min(MAX_DELAY_MS);
                let delay_ms = err
                    .retry_after_secs()
                    .map_or(computed, |secs| secs.saturating_mul(1000).min(MAX_DELAY_MS));
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient adapter error — retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use omnitrack_core::Platform;

    use super::*;

    fn unavailable() -> AdapterError {
        AdapterError::PlatformUnavailable {
            platform: Platform::Doordash,
            status: 503,
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, AdapterError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_k_failures_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(unavailable())
                } else {
                    Ok::<u32, AdapterError>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3, "2 failures + 1 success");
    }

    #[tokio::test]
    async fn propagates_last_error_after_exhausting_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, AdapterError>(unavailable())
            }
        })
        .await;
        // max_retries=2 → 3 total attempts
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(AdapterError::PlatformUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn does_not_retry_auth_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, AdapterError>(AdapterError::Auth {
                    platform: Platform::Shipt,
                    reason: "session expired".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "auth must not be retried");
        assert!(matches!(result, Err(AdapterError::Auth { .. })));
    }

    #[tokio::test]
    async fn does_not_retry_data_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, AdapterError>(AdapterError::Data {
                    context: "orders".to_owned(),
                    reason: "missing field".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(AdapterError::Data { .. })));
    }

    #[tokio::test]
    async fn honors_retry_after_from_rate_limit() {
        // retry_after of 0 seconds keeps the test fast while still exercising
        // the override path.
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(1, 60_000, || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(AdapterError::RateLimited {
                        platform: Platform::Drizly,
                        retry_after_secs: 0,
                    })
                } else {
                    Ok::<u32, AdapterError>(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
