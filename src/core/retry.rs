//! Bounded retry for transient platform failures.

use crate::errors::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How many times, and how patiently, to retry a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Policy that retries immediately. Used by tests.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the
    /// attempts are used up. Exhaustion is reported as
    /// [`Error::RetriesExhausted`] wrapping the last transient error.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut delay = self.base_delay;
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation, attempt, attempts, e, delay
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    return Err(Error::RetriesExhausted {
                        operation,
                        attempts,
                        last_error: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}
