use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Errors that may carry the HTTP status of the failed call
pub trait RetryableError {
    fn status(&self) -> Option<u16>;
}

/// Bounded exponential backoff for transient HTTP failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub retriable_statuses: Vec<u16>,
    /// Up to this fraction of the computed delay is added as jitter
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            retriable_statuses: vec![408, 429, 500, 502, 503, 504],
            jitter_fraction: 0.3,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, nothing retried
    pub fn none() -> Self {
        Self {
            max_retries: 1,
            ..Self::default()
        }
    }

    pub fn is_retriable(&self, status: Option<u16>) -> bool {
        status.is_some_and(|s| self.retriable_statuses.contains(&s))
    }

    /// Delay before retry number `retry` (1-based), without jitter.
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        scale(self.base_delay, self.multiplier.max(1.0).powi(exponent))
    }

    fn delay_with_jitter(&self, retry: u32) -> Duration {
        let delay = self.backoff(retry);
        let jitter = if self.jitter_fraction.is_nan() {
            0.0
        } else {
            self.jitter_fraction.clamp(0.0, 1.0)
        };
        if jitter == 0.0 {
            return delay;
        }
        let extra = scale(delay, rand::thread_rng().gen_range(0.0..=jitter));
        delay.saturating_add(extra)
    }

    /// Run `op`, retrying failures that carry a retriable status.
    ///
    /// The last error is returned once attempts are exhausted.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + Display,
    {
        let max_attempts = self.max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let status = error.status();
            if attempt >= max_attempts || !self.is_retriable(status) {
                return Err(error);
            }

            let delay = self.delay_with_jitter(attempt);
            warn!(
                status = ?status,
                delay_ms = delay.as_millis() as u64,
                attempt,
                max_attempts,
                "Retrying request after error: {}",
                error
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn scale(delay: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}
