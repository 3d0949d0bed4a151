#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # request-governor
//!
//! Client-side request governance: classify outbound requests into categories, keep each
//! category inside a fixed-window budget, honor server 429 signals, and retry transient failures
//! with bounded exponential backoff.
//!
//! ## Features
//!
//! - **Category resolution** from substring rules over the request address
//! - **Fixed-window admission** with a per-category cooldown once the budget is spent
//! - **Server authority**: a real 429 puts the category into the advertised `Retry-After` cooldown
//! - **Synthetic 429s** for locally denied requests, shaped like the server's
//! - **Backoff retry** for 429 and 5xx, fail-fast for everything else
//! - **Tower middleware** wrapping any `http` client service
//! - **Structured telemetry** through `tower::Service` sinks and `tracing`
//!
//! ## Quick Start
//!
//! ```rust
//! use request_governor::{GovernError, GovernorConfig, RateGovernor, RetryPolicy};
//! use request_governor::sleeper::InstantSleeper;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let governor = RateGovernor::new(GovernorConfig::default()).unwrap();
//! let retry = RetryPolicy::<GovernError>::builder()
//!     .with_sleeper(InstantSleeper)
//!     .build()
//!     .unwrap();
//!
//! let governor = &governor;
//! let body = retry
//!     .execute(|| async move {
//!         let response = governor
//!             .governed_request("https://api.example.com/cases/1", || async {
//!                 // Your HTTP client goes here.
//!                 Ok::<_, GovernError>(http::Response::new(String::from("{}")))
//!             })
//!             .await?;
//!         GovernError::check_response(response).map(http::Response::into_body)
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(body, "{}");
//! # });
//! ```

pub mod backoff;
pub mod category;
pub mod clock;
pub mod config;
pub mod error;
pub mod governor;
pub mod middleware;
pub mod outcome;
pub mod prelude;
pub mod retry;
pub mod sleeper;
pub mod telemetry;
pub mod window;

// Re-exports
pub use backoff::{Backoff, BackoffError};
pub use category::{Category, CategoryResolver, CategoryRule};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{GovernorConfig, LimitPolicy};
pub use error::{is_retryable, is_retryable_status, ConfigError, GovernError, HasStatus};
pub use governor::RateGovernor;
pub use middleware::{GovernedLayer, GovernedService};
pub use outcome::{synthetic_rejection, Outcome, RateLimitBody};
pub use retry::{retry_with_backoff, BuildError, RetryPolicy, RetryPolicyBuilder};
pub use sleeper::{ClockSleeper, InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use window::{Admission, CategoryStatus, WindowState, WindowStore};
