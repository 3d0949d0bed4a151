//! Error types for request governance.
//!
//! [`GovernError`] classifies the outcome of a governed call once the caller decides a response
//! is a failure. The four kinds map onto how the rest of the crate treats them:
//!
//! | variant            | server contacted | updates window state | retried by default |
//! |--------------------|------------------|----------------------|--------------------|
//! | `LocallyThrottled` | no               | no                   | yes                |
//! | `ServerThrottled`  | yes              | yes (by the wrapper) | yes                |
//! | `TransientServer`  | yes              | no                   | yes                |
//! | `Terminal`         | maybe            | no                   | no                 |

use crate::category::Category;
use crate::outcome::{parse_retry_after, Outcome};
use crate::config::DEFAULT_SERVER_COOLDOWN;
use http::StatusCode;
use std::time::Duration;

/// Failure taxonomy for governed requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GovernError {
    /// Admission denied before any network attempt.
    #[error("request in category `{category}` throttled locally; retry after {retry_after:?}")]
    LocallyThrottled { category: Category, retry_after: Duration },
    /// The server answered 429.
    #[error("server rejected request with 429; retry after {retry_after:?}")]
    ServerThrottled { category: Option<Category>, retry_after: Duration },
    /// The server answered 5xx.
    #[error("server error {status}")]
    TransientServer { status: StatusCode },
    /// Any other failure: non-429 4xx, or a transport error.
    #[error("request failed: {message}")]
    Terminal { status: Option<StatusCode>, message: String },
}

impl GovernError {
    /// Wrap a transport-level failure (no HTTP status available).
    pub fn transport(err: impl std::fmt::Display) -> Self {
        GovernError::Terminal { status: None, message: err.to_string() }
    }

    /// Classify a response. Returns `None` for anything below 400.
    ///
    /// A 429 produced by the governor itself carries an [`Outcome`] extension and maps to
    /// `LocallyThrottled`; any other 429 maps to `ServerThrottled`.
    pub fn from_response<B>(response: &http::Response<B>) -> Option<Self> {
        let status = response.status();
        if !(status.is_client_error() || status.is_server_error()) {
            return None;
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Some(match response.extensions().get::<Outcome>() {
                Some(Outcome::LocallyBlocked { category, retry_after }) => {
                    GovernError::LocallyThrottled { category: category.clone(), retry_after: *retry_after }
                }
                Some(Outcome::ServerBlocked { category, retry_after }) => {
                    GovernError::ServerThrottled { category: Some(category.clone()), retry_after: *retry_after }
                }
                _ => GovernError::ServerThrottled {
                    category: None,
                    retry_after: parse_retry_after(response.headers()).unwrap_or(DEFAULT_SERVER_COOLDOWN),
                },
            });
        }
        if status.is_server_error() {
            return Some(GovernError::TransientServer { status });
        }
        Some(GovernError::Terminal {
            status: Some(status),
            message: status.canonical_reason().unwrap_or("client error").to_string(),
        })
    }

    /// Pass successful responses through; turn failures into errors.
    pub fn check_response<B>(response: http::Response<B>) -> Result<http::Response<B>, Self> {
        match Self::from_response(&response) {
            Some(err) => Err(err),
            None => Ok(response),
        }
    }

    /// Suggested wait for throttling errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::LocallyThrottled { retry_after, .. } | Self::ServerThrottled { retry_after, .. } => {
                Some(*retry_after)
            }
            _ => None,
        }
    }

    /// True when no network attempt was made.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::LocallyThrottled { .. })
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::LocallyThrottled { .. } | Self::ServerThrottled { .. })
    }
}

/// Errors that expose an HTTP status for retry classification.
pub trait HasStatus {
    fn status(&self) -> Option<StatusCode>;
}

impl HasStatus for GovernError {
    fn status(&self) -> Option<StatusCode> {
        match self {
            Self::LocallyThrottled { .. } | Self::ServerThrottled { .. } => {
                Some(StatusCode::TOO_MANY_REQUESTS)
            }
            Self::TransientServer { status } => Some(*status),
            Self::Terminal { status, .. } => *status,
        }
    }
}

impl HasStatus for StatusCode {
    fn status(&self) -> Option<StatusCode> {
        Some(*self)
    }
}

/// 429 and every 5xx are retryable.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Default retry predicate: retry 429 and 5xx, fail fast on everything else.
pub fn is_retryable<E: HasStatus + ?Sized>(err: &E) -> bool {
    err.status().map(is_retryable_status).unwrap_or(false)
}

/// Configuration validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("max_requests must be > 0")]
    ZeroMaxRequests,
    #[error("window duration must be > 0")]
    ZeroWindow,
    #[error("rule for category `{category}` has an empty pattern")]
    EmptyPattern { category: String },
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),
}
