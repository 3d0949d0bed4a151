//! Convenient re-exports for common request-governor types.
pub use crate::{
    backoff::{Backoff, BackoffError, MAX_BACKOFF},
    category::{Category, CategoryResolver, CategoryRule},
    config::{GovernorConfig, LimitPolicy},
    error::{is_retryable, ConfigError, GovernError, HasStatus},
    governor::RateGovernor,
    middleware::{GovernedLayer, GovernedService},
    outcome::{Outcome, RateLimitBody},
    retry::{retry_with_backoff, BuildError, RetryPolicy, RetryPolicyBuilder},
    telemetry::{GovernorEvent, LogSink, MemorySink, NullSink, TelemetrySink},
    window::{Admission, CategoryStatus},
};
