use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::error::{ClipcastError, ClipcastResult};
use crate::logger::{LogLevel, LOGGER};

/// Bounded exponential backoff for transient upload failures.
///
/// Only errors reporting `is_transient()` are retried. An attempt in flight
/// and the wait between attempts both end early with `Cancelled` when the
/// token fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// A single attempt, never retried
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (0 for the first retry)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Run `attempt` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `attempt` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, token: &CancellationToken, mut attempt: F) -> ClipcastResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ClipcastResult<T>>,
    {
        let mut number = 1;
        loop {
            if token.is_cancelled() {
                return Err(ClipcastError::Cancelled);
            }

            let outcome = tokio::select! {
                _ = token.cancelled() => return Err(ClipcastError::Cancelled),
                outcome = attempt(number) => outcome,
            };
            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_transient() || number >= self.max_attempts {
                return Err(error);
            }

            let delay = self.backoff_for(number - 1);
            LOGGER.log(
                LogLevel::Warn,
                &format!(
                    "Attempt {}/{} failed ({}), retrying in {:?}",
                    number, self.max_attempts, error, delay
                ),
                "upload::transport",
            );

            tokio::select! {
                _ = token.cancelled() => return Err(ClipcastError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            number += 1;
        }
    }
}
