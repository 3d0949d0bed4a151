//! The request governor: admission, server-signal recording, and status.
//!
//! A [`RateGovernor`] owns the category table and the clock. Clones share state via `Arc`, so
//! every handle (middleware instances, retry closures, diagnostics) observes and affects the same
//! windows.
//!
//! ```rust
//! use request_governor::{Category, GovernorConfig, LimitPolicy, RateGovernor};
//! use request_governor::clock::ManualClock;
//! use std::time::Duration;
//!
//! let policy = LimitPolicy::new(2, Duration::from_millis(1000), Duration::from_millis(500)).unwrap();
//! let clock = ManualClock::new();
//! let governor = RateGovernor::new(GovernorConfig::empty().with_policy("auth", policy))
//!     .unwrap()
//!     .with_clock(clock.clone());
//!
//! let auth = Category::new("auth");
//! assert!(governor.check_admission(&auth).is_allowed());
//! assert!(governor.check_admission(&auth).is_allowed());
//! assert_eq!(governor.check_admission(&auth).retry_after(), Some(Duration::from_millis(500)));
//!
//! clock.advance(Duration::from_millis(600));
//! assert!(governor.check_admission(&auth).is_allowed());
//! ```

use crate::category::{Category, CategoryResolver};
use crate::clock::{Clock, MonotonicClock};
use crate::config::GovernorConfig;
use crate::error::ConfigError;
use crate::outcome::{parse_retry_after, synthetic_rejection, Outcome};
use crate::window::{Admission, CategoryStatus, WindowState, WindowStore};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Admission decision for a concrete target address.
#[derive(Debug)]
pub(crate) enum Gate {
    Open(Category),
    Closed { category: Category, retry_after: Duration },
}

/// Client-side governor for outbound requests.
#[derive(Debug, Clone)]
pub struct RateGovernor {
    config: Arc<GovernorConfig>,
    resolver: Arc<CategoryResolver>,
    store: Arc<WindowStore>,
    clock: Arc<dyn Clock>,
}

impl RateGovernor {
    /// Validate `config` and build a governor on the monotonic clock.
    pub fn new(config: GovernorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            resolver: Arc::new(config.resolver()),
            config: Arc::new(config),
            store: Arc::new(WindowStore::new()),
            clock: Arc::new(MonotonicClock::default()),
        })
    }

    /// Override the clock (useful for deterministic tests).
    ///
    /// Existing window state is discarded: timestamps from the previous clock are meaningless on
    /// the new one.
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self.store = Arc::new(WindowStore::new());
        self
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Classify a target address.
    pub fn resolve(&self, target: &str) -> Category {
        self.resolver.resolve(target)
    }

    /// Decide whether a request in `category` may be sent now.
    ///
    /// Admission and bookkeeping happen under the category's lock; this never suspends.
    pub fn check_admission(&self, category: &Category) -> Admission {
        let policy = self.config.policy_for(category);
        let now = self.clock.now_millis();
        self.store.with_state(
            category,
            || WindowState::fresh(now, policy),
            |state| {
                let was_blocked = state.is_blocked();
                let admission = state.admit(now, policy);
                match admission {
                    Admission::Allowed if was_blocked => {
                        tracing::debug!(category = %category, "cooldown elapsed, category unblocked");
                    }
                    Admission::Denied { retry_after } if !was_blocked => {
                        tracing::warn!(
                            category = %category,
                            limit = policy.max_requests(),
                            retry_after_ms = retry_after.as_millis() as u64,
                            "local rate limit reached, entering cooldown"
                        );
                    }
                    _ => {}
                }
                admission
            },
        )
    }

    /// Trust a server 429: block `category` for `retry_after` regardless of local capacity.
    pub fn record_server_rejection(&self, category: &Category, retry_after: Duration) {
        let policy = self.config.policy_for(category);
        let now = self.clock.now_millis();
        self.store.with_state(
            category,
            || WindowState::fresh(now, policy),
            |state| state.saturate(now, policy, retry_after),
        );
        tracing::warn!(
            category = %category,
            retry_after_ms = retry_after.as_millis() as u64,
            "server rejected request with 429, category blocked"
        );
    }

    /// Read-only snapshot for every configured or previously seen category.
    pub fn status(&self) -> BTreeMap<Category, CategoryStatus> {
        let now = self.clock.now_millis();
        let mut out: BTreeMap<Category, CategoryStatus> = self
            .config
            .policies
            .iter()
            .map(|(category, policy)| (category.clone(), CategoryStatus::idle(policy.max_requests())))
            .collect();
        for (category, state) in self.store.snapshot() {
            let policy = self.config.policy_for(&category);
            out.insert(category, state.status(now, policy));
        }
        out
    }

    /// Status of a single category.
    pub fn status_of(&self, category: &Category) -> CategoryStatus {
        let policy = self.config.policy_for(category);
        match self.store.get(category) {
            Some(state) => state.status(self.clock.now_millis(), policy),
            None => CategoryStatus::idle(policy.max_requests()),
        }
    }

    /// Forget the state of one category.
    pub fn reset(&self, category: &Category) {
        self.store.remove(category);
    }

    /// Forget all state.
    pub fn reset_all(&self) {
        self.store.clear();
    }

    /// Resolve and admit `target` in one step.
    pub(crate) fn gate(&self, target: &str) -> Gate {
        let category = self.resolve(target);
        match self.check_admission(&category) {
            Admission::Allowed => Gate::Open(category),
            Admission::Denied { retry_after } => {
                tracing::debug!(category = %category, address = target, "request blocked locally");
                Gate::Closed { category, retry_after }
            }
        }
    }

    /// Inspect a real response: a 429 feeds the recorder. Tags the response with its [`Outcome`].
    pub(crate) fn observe_response<B>(&self, category: Category, response: &mut http::Response<B>) -> Outcome {
        let outcome = if response.status() == http::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers())
                .unwrap_or(self.config.server_default_cooldown);
            self.record_server_rejection(&category, retry_after);
            Outcome::ServerBlocked { category, retry_after }
        } else {
            Outcome::Admitted { category }
        };
        response.extensions_mut().insert(outcome.clone());
        outcome
    }

    /// Governed call around an arbitrary request primitive.
    ///
    /// `send` is only invoked when admission allows; otherwise the synthetic 429 is returned
    /// without I/O. Rate limiting is reported through the response status, never as `Err`; errors
    /// from `send` itself are passed through untouched.
    pub async fn governed_request<B, E, F, Fut>(&self, target: &str, send: F) -> Result<http::Response<B>, E>
    where
        B: From<String>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<http::Response<B>, E>>,
    {
        let category = match self.gate(target) {
            Gate::Open(category) => category,
            Gate::Closed { category, retry_after } => {
                return Ok(synthetic_rejection(&category, retry_after));
            }
        };
        let mut response = send().await?;
        self.observe_response(category, &mut response);
        Ok(response)
    }
}
