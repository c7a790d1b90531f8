//! Retry-with-backoff for provider calls.
//!
//! Grounded on the exponential-backoff-with-jitter shape used for pipeline
//! node retries elsewhere in the corpus: delay doubles per attempt up to a
//! cap, then jitters by a random factor in `[0.5, 1.5)`.

use std::time::Duration;

use agentrt_domain::config::ProviderConfig;
use agentrt_domain::error::Error;
use rand::Rng;

/// Backoff shape for one provider's retry policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 200,
            backoff_factor: 2.0,
            max_delay_ms: 10_000,
        }
    }
}

/// Attempt budget plus backoff shape. Built from a provider's
/// `max_retries`/`base_backoff_ms`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: BackoffConfig,
}

impl RetryPolicy {
    pub fn from_provider_config(cfg: &ProviderConfig) -> Self {
        Self {
            max_attempts: cfg.max_retries.saturating_add(1),
            backoff: BackoffConfig {
                initial_delay_ms: cfg.base_backoff_ms,
                ..BackoffConfig::default()
            },
        }
    }
}

/// Delay before the given 1-based retry attempt, capped and jittered.
pub fn delay_for_attempt(attempt: u32, backoff: &BackoffConfig) -> Duration {
    let base = (backoff.initial_delay_ms as f64)
        * backoff
            .backoff_factor
            .powi(i32::saturating_sub(attempt as i32, 1));
    let capped = base.min(backoff.max_delay_ms as f64);
    let jittered = capped * rand::rng().random_range(0.5..1.5);
    Duration::from_millis(jittered.max(0.0) as u64)
}

/// Run `op` under a retry policy. Retries only when the returned error is
/// [`Error::is_retryable`]; any other error, or exhaustion of the attempt
/// budget, is returned immediately.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, provider_id: &str, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if err.is_retryable() && attempt < policy.max_attempts {
                    let delay = delay_for_attempt(attempt, &policy.backoff);
                    tracing::warn!(
                        provider = provider_id,
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying provider call"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_exponentially_before_cap() {
        let backoff = BackoffConfig {
            initial_delay_ms: 100,
            backoff_factor: 2.0,
            max_delay_ms: 100_000,
        };
        // jitter makes exact values unstable; check ordering of the bases instead.
        let d1 = delay_for_attempt(1, &backoff).as_millis() as f64;
        let d3 = delay_for_attempt(3, &backoff).as_millis() as f64;
        // attempt 1 base=100 (jittered 50-150), attempt 3 base=400 (jittered 200-600)
        assert!(d3 > d1 * 0.5);
    }

    #[test]
    fn delay_respects_cap() {
        let backoff = BackoffConfig {
            initial_delay_ms: 1000,
            backoff_factor: 10.0,
            max_delay_ms: 2000,
        };
        let d = delay_for_attempt(5, &backoff).as_millis() as u64;
        assert!(d <= 3000); // capped at 2000 then jittered up to 1.5x
    }

    #[tokio::test]
    async fn with_retry_stops_on_non_retryable_error() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: BackoffConfig {
                initial_delay_ms: 1,
                backoff_factor: 1.0,
                max_delay_ms: 1,
            },
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), Error> = with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Validation("bad request".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn with_retry_exhausts_attempts_on_retryable_error() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: BackoffConfig {
                initial_delay_ms: 1,
                backoff_factor: 1.0,
                max_delay_ms: 1,
            },
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), Error> = with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::ProviderTimeout {
                    provider: "test".into(),
                    elapsed_ms: 1,
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn with_retry_succeeds_after_transient_failure() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: BackoffConfig {
                initial_delay_ms: 1,
                backoff_factor: 1.0,
                max_delay_ms: 1,
            },
        };
        let calls = AtomicU32::new(0);
        let result = with_retry(&policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(Error::ProviderUnavailable {
                        provider: "test".into(),
                        message: "down".into(),
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
