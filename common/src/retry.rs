use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("cancelled while retrying")]
    Cancelled,
}

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BACKOFF)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Total time spent sleeping between attempts when every attempt fails.
    pub fn total_backoff(&self) -> Duration {
        self.backoff * self.max_attempts.saturating_sub(1)
    }

    /// Runs `op` until it succeeds, the attempts run out, or `ct` is cancelled.
    ///
    /// `op` receives the 1-based attempt number. The pause between attempts is
    /// cut short by cancellation; no pause follows the final attempt.
    pub async fn retry<T, E, F, Fut>(
        &self,
        what: &str,
        ct: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;

        loop {
            if ct.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            attempt += 1;

            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("Connected to {} on attempt {}", what, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= self.max_attempts => {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    warn!(
                        "{} not available: {}. Retrying ({}/{}) in {:?}...",
                        what, e, attempt, self.max_attempts, self.backoff
                    );

                    tokio::select! {
                        _ = ct.cancelled() => return Err(RetryError::Cancelled),
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                }
            }
        }
    }
}
