//! Retry with back-off and jitter for provider calls.
//!
//! [`retry_with_policy`] wraps any fallible async operation and retries on
//! transient errors (rate limits, network timeouts). Non-transient errors,
//! including [`LlmError::Provider`] and [`LlmError::Validation`], are
//! returned immediately: a server-side failure is handled by provider
//! failover and a malformed response will not improve on replay.

use std::future::Future;
use std::time::Duration;

use jobsift_core::{AppConfig, RetryBackoff};

use crate::error::LlmError;

const DEFAULT_MAX_ATTEMPTS: u32 = 4;
const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// How provider calls are retried.
///
/// `max_attempts` counts total attempts including the first; a value of 1
/// disables retrying entirely.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff: RetryBackoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            backoff: RetryBackoff::Exponential,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.llm_max_attempts,
            base_delay_ms: config.llm_retry_base_ms,
            backoff: config.llm_retry_backoff,
        }
    }
}

/// Returns `true` for errors that are worth retrying after a delay.
///
/// **Retriable:**
/// - [`LlmError::RateLimited`]: throttling clears with time.
/// - Network-level failures: timeout, connection reset.
///
/// **Not retriable (surface immediately):**
/// - [`LlmError::Provider`]: server-side failure; failover picks another
///   backend instead of hammering this one.
/// - [`LlmError::Validation`]: malformed response; replaying won't fix it.
/// - [`LlmError::ContentFiltered`]: deliberate refusal; replaying won't fix it.
pub(crate) fn is_retriable(err: &LlmError) -> bool {
    match err {
        LlmError::RateLimited(_) => true,
        LlmError::Http(e) => e.is_timeout() || e.is_connect(),
        LlmError::Provider(_) | LlmError::Validation { .. } | LlmError::ContentFiltered(_) => {
            false
        }
    }
}

/// Runs `operation` up to `policy.max_attempts` times, sleeping between
/// transient failures.
///
/// With exponential back-off and `base_delay_ms = 1_000` the sleep before
/// attempt N+1 is `1_000 ms x 2^(N-1)`, jittered by +-25 % and capped at
/// 60 s. Fixed back-off sleeps `base_delay_ms` every time. Non-retriable
/// errors are returned immediately.
pub(crate) async fn retry_with_policy<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_attempts {
                    return Err(err);
                }
                let computed = match policy.backoff {
                    RetryBackoff::Fixed => policy.base_delay_ms,
                    RetryBackoff::Exponential => policy
                        .base_delay_ms
                        .saturating_mul(1u64 << (attempt - 1).min(10)),
                };
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms,
                    error = %err,
                    "transient provider error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 0,
            backoff: RetryBackoff::Fixed,
        }
    }

    #[test]
    fn rate_limited_is_retriable() {
        assert!(is_retriable(&LlmError::RateLimited("slow down".to_owned())));
    }

    #[test]
    fn provider_error_is_not_retriable() {
        assert!(!is_retriable(&LlmError::Provider("500".to_owned())));
    }

    #[test]
    fn validation_error_is_not_retriable() {
        assert!(!is_retriable(&LlmError::Validation {
            context: "test".to_owned(),
            reason: "missing field".to_owned(),
        }));
    }

    #[test]
    fn content_filtered_is_not_retriable() {
        assert!(!is_retriable(&LlmError::ContentFiltered(
            "refused".to_owned()
        )));
    }

    #[tokio::test]
    async fn connect_error_is_retriable() {
        let err = reqwest::Client::new()
            .get("http://0.0.0.0:1")
            .send()
            .await
            .unwrap_err();
        assert!(is_retriable(&LlmError::Http(err)));
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_policy(fast_policy(3), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, LlmError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_rate_limits_then_succeeds() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_policy(fast_policy(4), || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt <= 2 {
                    Err::<u32, _>(LlmError::RateLimited("throttled".to_owned()))
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99, "should succeed after retries");
        assert_eq!(
            calls.load(Ordering::SeqCst),
            3,
            "should have been called 3 times (2 rate limits + 1 success)"
        );
    }

    #[tokio::test]
    async fn exhausts_attempts_and_surfaces_rate_limit() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_policy(fast_policy(2), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(LlmError::RateLimited("throttled".to_owned()))
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2, "max_attempts bounds calls");
        assert!(matches!(result, Err(LlmError::RateLimited(_))));
    }

    #[tokio::test]
    async fn does_not_retry_provider_errors() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_policy(fast_policy(4), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(LlmError::Provider("server exploded".to_owned()))
            }
        })
        .await;
        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "provider errors must not be retried"
        );
        assert!(matches!(result, Err(LlmError::Provider(_))));
    }
}
