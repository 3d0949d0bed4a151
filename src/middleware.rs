//! Tower middleware that governs an HTTP client service.
//!
//! `GovernedLayer` wraps any `tower::Service<http::Request<_>>` that returns `http::Response<_>`.
//! The request URI is classified into a category and checked for admission before the inner
//! service is called. Denied requests get a synthetic 429 without the inner service ever seeing
//! them; real 429s coming back from the inner service put the category into the server-advertised
//! cooldown. Rate limiting never surfaces as `Err`: the error type is the inner service's.
//!
//! ```rust,no_run
//! use request_governor::{GovernedLayer, GovernorConfig, RateGovernor};
//! use request_governor::telemetry::LogSink;
//! use tower::ServiceBuilder;
//!
//! # fn wrap<S>(client: S) {
//! let governor = RateGovernor::new(GovernorConfig::default()).unwrap();
//! let svc = ServiceBuilder::new()
//!     .layer(GovernedLayer::new(governor.clone()).with_sink(LogSink))
//!     .service(client);
//! # }
//! ```

use crate::governor::{Gate, RateGovernor};
use crate::outcome::synthetic_rejection;
use crate::telemetry::{Emitter, GovernorEvent, TelemetrySink};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// A layer that governs requests with a shared [`RateGovernor`].
#[derive(Clone, Debug)]
pub struct GovernedLayer {
    governor: RateGovernor,
    emitter: Emitter,
}

impl GovernedLayer {
    pub fn new(governor: RateGovernor) -> Self {
        Self { governor, emitter: Emitter::disabled() }
    }

    /// Report admission decisions and server rejections to `sink`.
    pub fn with_sink<S>(mut self, sink: S) -> Self
    where
        S: TelemetrySink,
        S::Future: Send + 'static,
    {
        self.emitter = Emitter::new(sink);
        self
    }

    pub fn governor(&self) -> &RateGovernor {
        &self.governor
    }
}

impl<S> Layer<S> for GovernedLayer {
    type Service = GovernedService<S>;

    fn layer(&self, service: S) -> Self::Service {
        GovernedService {
            inner: service,
            governor: self.governor.clone(),
            emitter: self.emitter.clone(),
        }
    }
}

/// Middleware service produced by [`GovernedLayer`].
#[derive(Clone, Debug)]
pub struct GovernedService<S> {
    inner: S,
    governor: RateGovernor,
    emitter: Emitter,
}

impl<S> GovernedService<S> {
    pub fn new(inner: S, governor: RateGovernor) -> Self {
        GovernedLayer::new(governor).layer(inner)
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for GovernedService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: From<String> + Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        // Admission is decided at call time so ordering within a category is call order.
        let gate = self.governor.gate(&req.uri().to_string());
        let governor = self.governor.clone();
        let emitter = self.emitter.clone();
        // Keep the instance that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match gate {
                Gate::Closed { category, retry_after } => {
                    let response = synthetic_rejection(&category, retry_after);
                    emitter.emit(GovernorEvent::LocallyBlocked { category, retry_after }).await;
                    Ok(response)
                }
                Gate::Open(category) => {
                    let mut response = inner.call(req).await?;
                    let outcome = governor.observe_response(category, &mut response);
                    emitter.emit(outcome.into()).await;
                    Ok(response)
                }
            }
        })
    }
}
