#![allow(dead_code)]

use http::{HeaderValue, StatusCode};
use request_governor::{GovernorConfig, LimitPolicy, ManualClock, RateGovernor};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

/// Stand-in for an HTTP client: replays scripted statuses, then answers 200.
#[derive(Clone, Default)]
pub struct ScriptedServer {
    script: Arc<Mutex<VecDeque<(StatusCode, Option<&'static str>)>>>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one response; `retry_after` becomes the `Retry-After` header.
    pub fn then(self, status: StatusCode, retry_after: Option<&'static str>) -> Self {
        self.script.lock().unwrap().push_back((status, retry_after));
        self
    }

    /// Addresses that actually reached the server, in order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn respond(&self, uri: &str) -> http::Response<String> {
        self.seen.lock().unwrap().push(uri.to_string());
        let (status, retry_after) =
            self.script.lock().unwrap().pop_front().unwrap_or((StatusCode::OK, None));
        let body = if status == StatusCode::TOO_MANY_REQUESTS {
            r#"{"error":"Rate limited","message":"slow down","retryAfter":0}"#.to_string()
        } else {
            "{}".to_string()
        };
        let mut response = http::Response::new(body);
        *response.status_mut() = status;
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(http::header::RETRY_AFTER, HeaderValue::from_static(secs));
        }
        response
    }
}

impl Service<http::Request<()>> for ScriptedServer {
    type Response = http::Response<String>;
    type Error = Infallible;
    type Future = futures::future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<()>) -> Self::Future {
        futures::future::ready(Ok(self.respond(&req.uri().to_string())))
    }
}

pub fn policy(max: u32, window_ms: u64, cooldown_ms: u64) -> LimitPolicy {
    LimitPolicy::new(max, Duration::from_millis(window_ms), Duration::from_millis(cooldown_ms))
        .expect("valid policy")
}

/// Governor with a single "auth" category on a manual clock at t=0.
pub fn auth_governor(max: u32, window_ms: u64, cooldown_ms: u64) -> (RateGovernor, ManualClock) {
    let config = GovernorConfig::empty()
        .with_policy("auth", policy(max, window_ms, cooldown_ms))
        .with_rule("/auth", "auth");
    let clock = ManualClock::new();
    let governor = RateGovernor::new(config).expect("valid config").with_clock(clock.clone());
    (governor, clock)
}

pub fn get(uri: &str) -> http::Request<()> {
    http::Request::builder().uri(uri).body(()).expect("valid request")
}
