//! Bounded retry with exponential backoff
//!
//! Every failure is retried until `max_attempts` attempts have been made.
//! Waits grow by `backoff_multiplier` up to `max_delay`, with optional
//! jitter, to stay under the download provider's rate limits. There is no
//! wait after the final attempt.
//!
//! # Example
//!
//! ```no_run
//! use mpme::config::RetryConfig;
//! use mpme::retry::with_retry;
//!
//! # async fn example() {
//! let config = RetryConfig::default();
//! let outcome = with_retry(&config, |attempt| async move {
//!     if attempt < 2 { Err("flaky") } else { Ok(attempt) }
//! })
//! .await;
//! assert_eq!(outcome.attempts, 2);
//! # }
//! ```

use crate::config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Result of a retried operation together with the number of attempts made
#[must_use]
#[derive(Debug)]
pub struct Attempted<T, E> {
    /// Success value, or the error of the last attempt
    pub result: Result<T, E>,
    /// Attempts made, first try included
    pub attempts: u32,
}

impl<T, E> Attempted<T, E> {
    /// Whether the operation eventually succeeded
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run `operation` until it succeeds or `config.max_attempts` attempts are used
///
/// The closure receives the 1-based attempt number. A `max_attempts` of zero
/// is treated as one.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Attempted<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    let mut delay = config.initial_delay;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "operation succeeded after retry");
                }
                return Attempted {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, retrying"
                );

                let wait = if config.jitter { add_jitter(delay) } else { delay };
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }

                let next = delay.as_secs_f64() * config.backoff_multiplier;
                delay = Duration::try_from_secs_f64(next)
                    .unwrap_or(config.max_delay)
                    .min(config.max_delay);
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    attempts = attempt,
                    "operation failed after all attempts"
                );
                return Attempted {
                    result: Err(e),
                    attempts: attempt,
                };
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The result lies between `delay` and `2 * delay`. A delay too large to
/// scale is returned unchanged.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_success_no_retry() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let outcome = with_retry(&RetryConfig::immediate(3), |_| {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(42)
            }
        })
        .await;

        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1, "should only call once");
    }

    #[tokio::test]
    async fn test_fail_k_then_succeed_uses_k_plus_one_attempts() {
        for k in 0..3u32 {
            let counter = Arc::new(AtomicU32::new(0));
            let counter_clone = counter.clone();

            let outcome = with_retry(&RetryConfig::immediate(3), |_| {
                let counter = counter_clone.clone();
                async move {
                    let count = counter.fetch_add(1, Ordering::SeqCst);
                    if count < k { Err("flaky".to_string()) } else { Ok(()) }
                }
            })
            .await;

            assert!(outcome.is_ok(), "k = {k}");
            assert_eq!(outcome.attempts, k + 1);
            assert_eq!(counter.load(Ordering::SeqCst), k + 1);
        }
    }

    #[tokio::test]
    async fn test_exhausted_makes_exactly_max_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let outcome = with_retry(&RetryConfig::immediate(3), |attempt| {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(format!("failure {attempt}"))
            }
        })
        .await;

        assert_eq!(outcome.result.unwrap_err(), "failure 3", "last error is kept");
        assert_eq!(outcome.attempts, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_max_attempts_still_tries_once() {
        let outcome = with_retry(&RetryConfig::immediate(0), |_| async {
            Err::<(), _>("nope")
        })
        .await;
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_exponential_backoff() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter: false,
        };

        let start = std::time::Instant::now();
        let outcome = with_retry(&config, |_| async { Err::<(), _>("transient") }).await;
        let elapsed = start.elapsed();

        assert_eq!(outcome.attempts, 3);
        // 10ms + 20ms, nothing after the last attempt
        assert!(
            elapsed >= Duration::from_millis(30),
            "should wait at least 30ms, waited {elapsed:?}"
        );
        assert!(
            elapsed < Duration::from_secs(2),
            "should not wait too long, waited {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn test_huge_multiplier_is_capped_by_max_delay() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 1e300,
            jitter: true,
        };

        let outcome = with_retry(&config, |_| async { Err::<(), _>("transient") }).await;

        assert_eq!(outcome.attempts, 3);
    }

    #[test]
    fn test_jitter_on_largest_delay_keeps_it() {
        assert_eq!(add_jitter(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let delay = Duration::from_millis(100);
        for _ in 0..20 {
            let jittered = add_jitter(delay);
            assert!(jittered >= delay);
            assert!(jittered <= delay * 2);
        }
    }
}
