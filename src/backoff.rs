//! Capped exponential backoff for the retry engine.
//!
//! Attempt semantics: attempt index `0` is the first call. The delay returned for attempt `n` is
//! the wait *after* attempt `n` failed, i.e. `min(base * 2^n, max)`. With the defaults
//! (1s base, 30s cap) the sequence is 1s, 2s, 4s, 8s, 16s, 30s, 30s, ...
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use request_governor::Backoff;
//!
//! let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(2)).unwrap();
//! assert_eq!(backoff.delay(0), Duration::from_millis(100));
//! assert_eq!(backoff.delay(1), Duration::from_millis(200));
//! assert_eq!(backoff.delay(5), Duration::from_secs(2)); // capped
//! ```
//!
//! Overflow behavior: computations that would overflow saturate to the configured cap, which is
//! itself bounded by `MAX_BACKOFF` (1 day).

use std::fmt;
use std::time::Duration;

/// Upper bound for any configured cap (1 day).
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Default base delay (first wait).
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Default cap on a single wait.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffError {
    MaxMustBePositive,
    MaxLessThanBase { base: Duration, max: Duration },
    MaxTooLarge(Duration),
}

impl fmt::Display for BackoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffError::MaxMustBePositive => write!(f, "max delay must be greater than zero"),
            BackoffError::MaxLessThanBase { base, max } => {
                write!(f, "max delay ({:?}) must be >= base delay ({:?})", max, base)
            }
            BackoffError::MaxTooLarge(max) => {
                write!(f, "max delay ({:?}) exceeds the {:?} ceiling", max, MAX_BACKOFF)
            }
        }
    }
}

impl std::error::Error for BackoffError {}

/// Exponential backoff with an upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// Build a backoff doubling from `base` and never exceeding `max`.
    pub fn new(base: Duration, max: Duration) -> Result<Self, BackoffError> {
        if max.is_zero() {
            return Err(BackoffError::MaxMustBePositive);
        }
        if max < base {
            return Err(BackoffError::MaxLessThanBase { base, max });
        }
        if max > MAX_BACKOFF {
            return Err(BackoffError::MaxTooLarge(max));
        }
        Ok(Self { base, max })
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Wait to apply after attempt `attempt` (0-based) failed.
    pub fn delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.min(u32::MAX as usize) as u32;
        let multiplier = 2u128.saturating_pow(exponent);
        let nanos = self.base.as_nanos().saturating_mul(multiplier);
        if nanos >= self.max.as_nanos() {
            self.max
        } else {
            // nanos < max <= MAX_BACKOFF, which fits in u64
            Duration::from_nanos(nanos as u64)
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self { base: DEFAULT_BASE_DELAY, max: DEFAULT_MAX_DELAY }
    }
}
