//! # Adaptive Timeout Retry Policy
//!
//! A single retry strategy shared by session creation and batch fan-out:
//! every attempt runs under a timeout that starts at `base_timeout` and grows
//! geometrically by `multiplier` up to `max_timeout`, for at most
//! `max_attempts` attempts.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::transport::{TransportError, TransportPhase};

/// Value object describing one adaptive timeout schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub base_timeout: Duration,
    pub multiplier: f64,
    pub max_timeout: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_timeout: Duration, multiplier: f64, max_timeout: Duration, max_attempts: u32) -> Self {
        Self {
            base_timeout,
            multiplier,
            max_timeout,
            max_attempts,
        }
    }

    /// Single attempt with a fixed timeout
    pub fn single(timeout: Duration) -> Self {
        Self::new(timeout, 1.0, timeout, 1)
    }

    /// Timeout granted to the zero-based `attempt`
    pub fn attempt_timeout(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let scaled = self.base_timeout.as_secs_f64() * factor;
        if !scaled.is_finite() || scaled >= self.max_timeout.as_secs_f64() {
            self.max_timeout
        } else {
            Duration::from_secs_f64(scaled)
        }
    }

    /// The full timeout schedule, one entry per attempt
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts.max(1))
            .map(|attempt| self.attempt_timeout(attempt))
            .collect()
    }

    /// Worst-case wall time spent before giving up
    pub fn total_budget(&self) -> Duration {
        self.schedule().into_iter().sum()
    }

    /// Run `operation` under this policy.
    ///
    /// The closure receives the zero-based attempt number and the timeout for
    /// that attempt. An attempt that exceeds its timeout is cancelled and
    /// counted as a [`TransportError::Timeout`] for `phase`. Non-retryable
    /// errors end the loop immediately; exhausting the budget yields
    /// [`TransportError::RetriesExhausted`] wrapping the last failure.
    pub async fn run<T, F, Fut>(
        &self,
        host: &str,
        phase: TransportPhase,
        mut operation: F,
    ) -> Result<T, TransportError>
    where
        F: FnMut(u32, Duration) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        self.retry(host, phase, |attempt, timeout| {
            let attempt_future = operation(attempt, timeout);
            async move {
                tokio::time::timeout(timeout, attempt_future)
                    .await
                    .unwrap_or_else(|_| Err(TransportError::timeout(host, phase, timeout)))
            }
        })
        .await
    }

    /// Same retry loop as [`RetryPolicy::run`], but the closure is trusted to
    /// bound its own attempt with the timeout it is given. Used when only part
    /// of an attempt belongs under this policy's clock, e.g. the execute phase
    /// of a batch attempt whose connect phase has its own policy.
    pub async fn retry<T, F, Fut>(
        &self,
        host: &str,
        phase: TransportPhase,
        mut operation: F,
    ) -> Result<T, TransportError>
    where
        F: FnMut(u32, Duration) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            let timeout = self.attempt_timeout(attempt);
            let error = match operation(attempt, timeout).await {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_retryable() => return Err(error),
                Err(error) => error,
            };

            debug!(
                host = %host,
                phase = %phase,
                attempt = attempt + 1,
                max_attempts = attempts,
                timeout_ms = timeout.as_millis() as u64,
                error = %error,
                "🔁 Attempt failed, retrying with a longer timeout"
            );
            last_error = Some(error);
        }

        let last_error = last_error.unwrap_or_else(|| TransportError::timeout(host, phase, self.max_timeout));
        warn!(
            host = %host,
            phase = %phase,
            attempts = attempts,
            error = %last_error,
            "Retry budget exhausted"
        );
        Err(TransportError::RetriesExhausted {
            host: host.to_string(),
            attempts,
            last_error: Box::new(last_error),
        })
    }
}
