//! Structured telemetry for governed requests and retries.
//!
//! The governor and the retry engine describe what they decide as [`GovernorEvent`]s. Events are
//! delivered to a [`TelemetrySink`], which is a plain `tower::Service<GovernorEvent>` so sinks can
//! be composed with ordinary tower combinators.
//!
//! ```rust
//! use request_governor::telemetry::{GovernorEvent, MemorySink};
//! use request_governor::Category;
//! use std::time::Duration;
//!
//! let sink = MemorySink::new();
//! let _event = GovernorEvent::LocallyBlocked {
//!     category: Category::new("auth"),
//!     retry_after: Duration::from_millis(500),
//! };
//! assert!(sink.is_empty());
//! ```

pub mod events;
pub mod sinks;

pub use events::GovernorEvent;
pub use sinks::{emit_best_effort, Emitter, LogSink, MemorySink, NullSink, TelemetrySink};
