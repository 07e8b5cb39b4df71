//! Bounded retry helper.
//!
//! A [`RetryPolicy`] carries an attempt cap and a fixed delay. [`RetryPolicy::run`]
//! drives an async operation until it succeeds, the error is classified as not
//! retryable, or the cap is reached; the last error is returned unchanged.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempt cap plus fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Single attempt, no delay
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Effective attempt cap; a configured zero still runs the operation once.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Run `op` until it succeeds or gives up.
    ///
    /// `op` receives the 1-based attempt number. `is_retryable` decides whether a
    /// failed attempt is worth repeating; non-retryable errors are returned
    /// immediately.
    pub async fn run<T, E, F, Fut, P>(&self, operation: &str, mut op: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.attempts();
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < max_attempts && is_retryable(&e) => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt >= max_attempts && is_retryable(&e) {
                        tracing::warn!(
                            operation,
                            attempt,
                            max_attempts,
                            error = %e,
                            "Retries exhausted"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}
