//! Tagged governance outcomes and the adapter to HTTP response shape.
//!
//! Inside the crate a governed call ends in one of three [`Outcome`]s. Only at the transport
//! boundary is `LocallyBlocked` turned into an `http::Response` that looks exactly like a server
//! 429: same status, same `Retry-After` header, same JSON body schema. Callers therefore need a
//! single failure path for both.

use crate::category::Category;
use crate::config::duration_millis;
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a governed call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Admitted and answered by the server with something other than 429.
    Admitted { category: Category },
    /// Denied by local admission; no network I/O happened.
    LocallyBlocked { category: Category, retry_after: Duration },
    /// Admitted, but the server answered 429.
    ServerBlocked { category: Category, retry_after: Duration },
}

impl Outcome {
    pub fn category(&self) -> &Category {
        match self {
            Outcome::Admitted { category }
            | Outcome::LocallyBlocked { category, .. }
            | Outcome::ServerBlocked { category, .. } => category,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Outcome::Admitted { .. } => None,
            Outcome::LocallyBlocked { retry_after, .. } | Outcome::ServerBlocked { retry_after, .. } => {
                Some(*retry_after)
            }
        }
    }

    pub fn is_blocked(&self) -> bool {
        !matches!(self, Outcome::Admitted { .. })
    }
}

/// JSON body of a 429, local or remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitBody {
    pub error: String,
    pub message: String,
    /// Milliseconds until the category accepts requests again.
    #[serde(rename = "retryAfter")]
    pub retry_after: u64,
}

impl RateLimitBody {
    pub fn new(category: &Category, retry_after: Duration) -> Self {
        Self {
            error: "Rate limited".to_string(),
            message: format!(
                "Too many {} requests. Please wait {} seconds before trying again.",
                category,
                retry_after_secs(retry_after)
            ),
            retry_after: duration_millis(retry_after),
        }
    }
}

/// `Retry-After` value: whole seconds, rounded up.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    duration_millis(retry_after).div_ceil(1000)
}

/// Parse a `Retry-After` header given in integer seconds.
///
/// Returns `None` when the header is missing or not a non-negative integer (HTTP-date values are
/// not interpreted); the caller substitutes its configured default.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Build the response a locally denied request receives, without touching the network.
///
/// The body type only needs to be constructible from a `String`, which covers `String`,
/// `Vec<u8>`, `bytes::Bytes` and most body wrappers.
pub fn synthetic_rejection<B>(category: &Category, retry_after: Duration) -> http::Response<B>
where
    B: From<String>,
{
    let body = RateLimitBody::new(category, retry_after);
    let json = serde_json::json!({
        "error": body.error,
        "message": body.message,
        "retryAfter": body.retry_after,
    })
    .to_string();

    let mut response = http::Response::new(B::from(json));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    let headers = response.headers_mut();
    headers.insert(RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
        .extensions_mut()
        .insert(Outcome::LocallyBlocked { category: category.clone(), retry_after });
    response
}
