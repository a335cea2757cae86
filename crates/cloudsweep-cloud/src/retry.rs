//! Bounded retry policy for provider calls

use crate::digest::FailureDigest;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Fixed-delay retry policy wrapping transient provider calls.
///
/// Kept separate from the operations it drives so the retry behavior is
/// testable on its own under a paused clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Outcome of a retried operation that never succeeded.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Failed with an error retrying cannot fix; returned on first sight.
    Fatal(E),

    /// Every attempt failed with a transient error.
    Exhausted {
        attempts: u32,
        failures: FailureDigest,
    },
}

impl<E: Display> Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Fatal(err) => write!(f, "{}", err),
            RetryError::Exhausted { attempts, failures } => {
                write!(f, "gave up after {} attempts: {}", attempts, failures)
            }
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_where(op, |_| true).await
    }

    /// Run `op`, retrying only errors `retryable` accepts. The first
    /// non-retryable error short-circuits as [`RetryError::Fatal`].
    pub async fn run_where<T, E, F, Fut, P>(
        &self,
        mut op: F,
        retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let mut failures = FailureDigest::new();
        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if retryable(&err) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "Attempt failed"
                    );
                    failures.record(err.to_string());
                    if attempt < self.max_attempts {
                        sleep(self.delay).await;
                    }
                }
                Err(err) => return Err(RetryError::Fatal(err)),
            }
        }

        Err(RetryError::Exhausted {
            attempts: self.max_attempts,
            failures,
        })
    }
}
