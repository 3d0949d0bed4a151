//! Bounded exponential retry for async operations.
//!
//! Semantics:
//! - Attempt `0` is the first call; `max_retries` counts the calls *after* it, so at most
//!   `max_retries + 1` calls happen.
//! - After attempt `n` fails with a retryable error the engine waits `min(base * 2^n, max)`
//!   (see [`Backoff`]) and tries again. Attempts are strictly sequential.
//! - The predicate decides retryability. By default, HTTP 429 and any 5xx are retryable and
//!   everything else fails fast (see [`is_retryable`]).
//! - When the predicate rejects an error, or the last attempt fails, that error is returned
//!   unchanged. Nothing is swallowed.
//! - The sleeper controls how waits are applied (production uses `TokioSleeper`; tests can
//!   inject `InstantSleeper`, `TrackingSleeper`, or `ClockSleeper`).
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use request_governor::{GovernError, RetryPolicy};
//! use request_governor::sleeper::InstantSleeper;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let policy = RetryPolicy::<GovernError>::builder()
//!     .max_retries(2)
//!     .base_delay(Duration::from_millis(100))
//!     .with_sleeper(InstantSleeper)
//!     .build()
//!     .unwrap();
//! let result: Result<(), GovernError> = policy
//!     .execute(|| async { Err(GovernError::transport("connection refused")) })
//!     .await;
//! assert!(result.is_err());
//! # });
//! ```
//!
//! No cancellation is built in: race [`RetryPolicy::execute`] against `tokio::time::timeout` to
//! bound total time.

use crate::backoff::{Backoff, BackoffError, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
use crate::error::{is_retryable, HasStatus};
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::telemetry::{Emitter, GovernorEvent, TelemetrySink};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: usize = 3;

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Retry policy combining backoff, predicate, and sleeper.
pub struct RetryPolicy<E> {
    max_retries: usize,
    backoff: Backoff,
    should_retry: Predicate<E>,
    sleeper: Arc<dyn Sleeper>,
    emitter: Emitter,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            backoff: self.backoff,
            should_retry: self.should_retry.clone(),
            sleeper: self.sleeper.clone(),
            emitter: self.emitter.clone(),
        }
    }
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("sleeper", &self.sleeper)
            .field("should_retry", &"<predicate>")
            .finish()
    }
}

impl<E> RetryPolicy<E>
where
    E: HasStatus + 'static,
{
    /// Builder preloaded with the status-based predicate.
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::with_predicate(|e: &E| is_retryable(e))
    }
}

impl<E> Default for RetryPolicy<E>
where
    E: HasStatus + 'static,
{
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::default(),
            should_retry: Arc::new(|e: &E| is_retryable(e)),
            sleeper: Arc::new(TokioSleeper),
            emitter: Emitter::disabled(),
        }
    }
}

impl<E> RetryPolicy<E> {
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Execute an async operation with retry semantics.
    pub async fn execute<T, Fut, Op>(&self, mut operation: Op) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0usize;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let retryable = (self.should_retry)(&err);
            if !retryable || attempt >= self.max_retries {
                tracing::debug!(
                    attempts = attempt + 1,
                    retryable,
                    "giving up, returning last error"
                );
                self.emitter
                    .emit(GovernorEvent::RetryGaveUp { attempts: attempt + 1, exhausted: retryable })
                    .await;
                return Err(err);
            }

            let delay = self.backoff.delay(attempt);
            tracing::debug!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "attempt failed, retrying after backoff"
            );
            self.emitter.emit(GovernorEvent::RetryScheduled { attempt: attempt + 1, delay }).await;
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Retry `operation` with the defaults: 3 retries, 1s base, 30s cap, 429/5xx retryable.
pub async fn retry_with_backoff<T, E, Fut, Op>(operation: Op) -> Result<T, E>
where
    E: HasStatus + 'static,
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    RetryPolicy::default().execute(operation).await
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder<E> {
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    should_retry: Predicate<E>,
    sleeper: Arc<dyn Sleeper>,
    emitter: Emitter,
}

/// Errors produced while building a retry policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("invalid backoff bounds: {0}")]
    Backoff(#[from] BackoffError),
}

impl<E> RetryPolicyBuilder<E> {
    /// Defaults with a caller-supplied predicate; usable for error types without a status.
    pub fn with_predicate<F>(predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            should_retry: Arc::new(predicate),
            sleeper: Arc::new(TokioSleeper),
            emitter: Emitter::disabled(),
        }
    }

    /// Retries after the first attempt. `0` means a single attempt.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    /// First wait.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Cap on any single wait.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Replace the retryability predicate.
    pub fn should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Report scheduled retries and give-ups to `sink`.
    pub fn with_sink<S>(mut self, sink: S) -> Self
    where
        S: TelemetrySink,
        S::Future: Send + 'static,
    {
        self.emitter = Emitter::new(sink);
        self
    }

    /// Build the retry policy, validating the delay bounds.
    pub fn build(self) -> Result<RetryPolicy<E>, BuildError> {
        let backoff = Backoff::new(self.base_delay, self.max_delay)?;
        Ok(RetryPolicy {
            max_retries: self.max_retries,
            backoff,
            should_retry: self.should_retry,
            sleeper: self.sleeper,
            emitter: self.emitter,
        })
    }
}
