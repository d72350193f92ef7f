//! Bounded retry with a caller-supplied delay schedule.
//!
//! Exhaustion is an explicit error value carrying the attempt count and the
//! last failure, so callers never mistake "gave up" for "nothing there".

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Delay before the attempt following failed attempt `n` (1-based).
type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn into_last(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// Retry policy parameterized by attempt budget and delay schedule.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: DelayFn,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, delay: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self { max_attempts: max_attempts.max(1), delay: Arc::new(delay) }
    }

    /// Wait `n * step` after the n-th failure.
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self::new(max_attempts, move |n| step.saturating_mul(n))
    }

    /// Single attempt, no retries.
    #[cfg(test)]
    pub fn once() -> Self {
        Self::new(1, |_| Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        (self.delay)(failed_attempt)
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(RetryError::Exhausted { attempts: attempt, last: e });
                }
                Err(e) => {
                    let wait = self.delay_after(attempt);
                    tracing::debug!(attempt, max_attempts = self.max_attempts, ?wait, error = %e, "attempt failed, retrying");
                    if !wait.is_zero() {
                        tokio::time::sleep(wait).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_linear_schedule() {
        let policy = RetryPolicy::linear(3, Duration::from_millis(1000));
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::linear(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let policy = RetryPolicy::linear(3, Duration::ZERO);
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryError<String>> = policy
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { if attempt < 3 { Err(format!("fail {attempt}")) } else { Ok(attempt) } }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_explicit() {
        let policy = RetryPolicy::linear(3, Duration::ZERO);
        let result: Result<(), RetryError<String>> =
            policy.run(|attempt| async move { Err(format!("fail {attempt}")) }).await;
        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.into_last(), "fail 3");
    }

    #[tokio::test]
    async fn test_once_does_not_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<&str>> = RetryPolicy::once()
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom") }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
