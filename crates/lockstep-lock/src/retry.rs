//! Bounded retries for lock-store round trips.
//!
//! Only transport and server errors are retried. Contention is an `Ok` answer
//! from the store and never comes through here as an error.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use lockstep_core::config::LockConfig;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{LockError, Result};

/// How many times to try a store call, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    tries: u32,
    retry_delay: Duration,
}

impl RetryBudget {
    /// `tries` below 1 is treated as 1.
    pub fn new(tries: u32, retry_delay: Duration) -> Self {
        Self {
            tries: tries.max(1),
            retry_delay,
        }
    }

    pub fn from_config(lock: &LockConfig) -> Self {
        Self::new(lock.tries, lock.retry_delay())
    }

    pub fn tries(&self) -> u32 {
        self.tries
    }

    /// Linear backoff: attempt `n` waits `n * retry_delay`, saturating.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay.checked_mul(attempt).unwrap_or(Duration::MAX)
    }
}

/// Run `op` until it succeeds or the budget is spent.
///
/// Every attempt and every backoff sleep races `cancel`; cancellation wins
/// and comes back as [`LockError::Cancelled`]. The last store error is
/// returned as [`LockError::BackingStore`].
pub async fn with_retries<T, E, F, Fut>(
    name: &str,
    budget: RetryBudget,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: fmt::Display,
{
    let cancelled = || LockError::Cancelled {
        name: name.to_string(),
    };

    let mut attempt: u32 = 1;
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            r = op() => r,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if attempt < budget.tries => {
                let delay = budget.backoff(attempt);
                warn!(
                    lock = %name,
                    attempt,
                    max = budget.tries,
                    error = %e,
                    retry_after_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "lock store error, retrying"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled()),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
            Err(e) => return Err(LockError::BackingStore(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use tokio::time::Instant;

    use super::*;

    /// Fails the first `failures` calls, then returns the call number.
    fn flaky(
        failures: u32,
        calls: Arc<AtomicU32>,
    ) -> impl FnMut() -> std::future::Ready<std::result::Result<u32, String>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= failures {
                std::future::ready(Err(format!("connection reset ({n})")))
            } else {
                std::future::ready(Ok(n))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_store_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let budget = RetryBudget::new(3, Duration::from_millis(100));
        let start = Instant::now();

        let cancel = CancellationToken::new();
        let n = with_retries("report", budget, &cancel, flaky(2, calls.clone()))
            .await
            .unwrap();

        assert_eq!(n, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms after the first failure, 200ms after the second
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(300), "{waited:?}");
        assert!(waited < Duration::from_millis(310), "{waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_is_a_backing_store_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let budget = RetryBudget::new(3, Duration::from_millis(100));

        let err = with_retries(
            "report",
            budget,
            &CancellationToken::new(),
            flaky(u32::MAX, calls.clone()),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), "BACKING_STORE_ERROR");
        assert!(err.to_string().contains("connection reset (3)"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn single_try_does_not_sleep() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let err = with_retries(
            "report",
            RetryBudget::new(1, Duration::from_secs(10)),
            &CancellationToken::new(),
            flaky(u32::MAX, calls.clone()),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), "BACKING_STORE_ERROR");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff_stops_retrying() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let err = with_retries(
            "report",
            RetryBudget::new(5, Duration::from_secs(1)),
            &cancel,
            flaky(u32::MAX, calls.clone()),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), "CANCELLED");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_before_start_never_calls_the_store() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let counter = Arc::clone(&calls);
        let err = with_retries(
            "report",
            RetryBudget::new(3, Duration::from_millis(100)),
            &cancel,
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), String>(())
                }
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), "CANCELLED");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn backoff_is_linear_and_saturates() {
        let budget = RetryBudget::new(3, Duration::from_millis(100));
        assert_eq!(budget.backoff(1), Duration::from_millis(100));
        assert_eq!(budget.backoff(3), Duration::from_millis(300));

        let huge = RetryBudget::new(3, Duration::from_millis(u64::MAX));
        assert_eq!(huge.backoff(2), Duration::MAX);
    }

    #[test]
    fn zero_tries_means_one() {
        assert_eq!(RetryBudget::new(0, Duration::ZERO).tries(), 1);
    }
}
