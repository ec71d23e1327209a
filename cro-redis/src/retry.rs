//! Bounded retry policy.
//!
//! Calls the operation immediately, then every `interval` while the error is
//! classified as retryable, until `max_duration` would be exceeded.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::context::Context;

/// Poll interval and ceiling for a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_duration: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_duration: Duration::from_secs(5 * 60),
        }
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error until the ceiling.
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        last: Option<E>,
    },
    /// An attempt failed with a non-retryable error.
    Fatal(E),
    /// The context was cancelled while waiting.
    Cancelled,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_duration: Duration) -> Self {
        Self {
            interval,
            max_duration,
        }
    }

    /// Run `op` until it succeeds, fails fatally, or the ceiling is reached.
    pub async fn retry<T, E, F, Fut, C>(
        &self,
        ctx: &Context,
        is_retryable: C,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let result = match ctx.run("retry attempt", op()).await {
                Ok(result) => result,
                Err(_) => return Err(RetryError::Cancelled),
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) => e,
                Err(e) => return Err(RetryError::Fatal(e)),
            };

            let elapsed = start.elapsed();
            if elapsed + self.interval > self.max_duration {
                return Err(RetryError::Exhausted {
                    attempts,
                    elapsed,
                    last: Some(err),
                });
            }
            debug!("Attempt {} failed ({}), retrying in {:?}", attempts, err, self.interval);

            if ctx
                .run("retry wait", tokio::time::sleep(self.interval))
                .await
                .is_err()
            {
                return Err(RetryError::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(5), Duration::from_millis(60))
    }

    #[test]
    fn test_default_policy_polls_every_five_seconds_for_five_minutes() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.max_duration, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let out: Result<u32, RetryError<String>> = fast_policy()
            .retry(&Context::background(), |_| true, || {
                let calls = &calls;
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 { Err(format!("attempt {}", n)) } else { Ok(n) }
                }
            })
            .await;

        assert_eq!(out.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_at_ceiling() {
        let out: Result<(), RetryError<String>> = fast_policy()
            .retry(&Context::background(), |_| true, || async {
                Err("denied".to_string())
            })
            .await;

        match out {
            Err(RetryError::Exhausted { attempts, last, .. }) => {
                assert!(attempts > 1);
                assert_eq!(last.as_deref(), Some("denied"));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fatal_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let out: Result<(), RetryError<String>> = fast_policy()
            .retry(&Context::background(), |e: &String| e != "fatal", || {
                let calls = &calls;
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("fatal".to_string())
                }
            })
            .await;

        assert!(matches!(out, Err(RetryError::Fatal(e)) if e == "fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_retrying() {
        let (ctx, handle) = Context::with_cancel();
        handle.cancel();
        let out: Result<(), RetryError<String>> = fast_policy()
            .retry(&ctx, |_| true, || async { Err("x".to_string()) })
            .await;
        assert!(matches!(out, Err(RetryError::Cancelled)));
    }
}
