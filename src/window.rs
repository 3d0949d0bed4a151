//! Fixed-window admission state.
//!
//! [`WindowState`] holds the per-category bookkeeping and the pure state transitions; the
//! [`WindowStore`] owns one state per category behind its own mutex so that admission for a
//! category is a serialized read-modify-write while different categories never contend.
//!
//! All times are milliseconds from the governor's [`Clock`](crate::clock::Clock).

use crate::category::Category;
use crate::config::LimitPolicy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may proceed now.
    Allowed,
    /// The category is cooling down.
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Admission::Allowed => None,
            Admission::Denied { retry_after } => Some(*retry_after),
        }
    }
}

/// Mutable per-category record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    count: u32,
    window_reset_at: u64,
    blocked: bool,
    blocked_until: Option<u64>,
}

impl WindowState {
    /// A new, empty window starting at `now`.
    pub fn fresh(now: u64, policy: &LimitPolicy) -> Self {
        Self {
            count: 0,
            window_reset_at: now.saturating_add(policy.window_millis()),
            blocked: false,
            blocked_until: None,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn window_reset_at(&self) -> u64 {
        self.window_reset_at
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn blocked_until(&self) -> Option<u64> {
        self.blocked_until
    }

    fn start_window(&mut self, now: u64, policy: &LimitPolicy) {
        *self = Self::fresh(now, policy);
    }

    /// Decide whether one more request may go out at `now`, updating the state.
    pub fn admit(&mut self, now: u64, policy: &LimitPolicy) -> Admission {
        if self.blocked {
            let until = self.blocked_until.unwrap_or(now);
            if now < until {
                return Admission::Denied { retry_after: Duration::from_millis(until - now) };
            }
            // cooldown over: unblock into a fresh window
            self.start_window(now, policy);
        }

        if now >= self.window_reset_at {
            self.count = 0;
            self.window_reset_at = now.saturating_add(policy.window_millis());
        }

        if self.count >= policy.max_requests() {
            self.blocked = true;
            self.blocked_until = Some(now.saturating_add(policy.cooldown_millis()));
            return Admission::Denied { retry_after: policy.cooldown() };
        }

        self.count += 1;
        Admission::Allowed
    }

    /// Overwrite with a server-imposed cooldown.
    pub fn saturate(&mut self, now: u64, policy: &LimitPolicy, retry_after: Duration) {
        let until = now.saturating_add(u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX));
        self.count = policy.max_requests();
        self.blocked = true;
        self.blocked_until = Some(until);
        self.window_reset_at = until;
    }

    /// Read-only view at `now`.
    pub fn status(&self, now: u64, policy: &LimitPolicy) -> CategoryStatus {
        let total = policy.max_requests();
        match self.blocked_until {
            Some(until) if self.blocked && now < until => CategoryStatus {
                remaining: 0,
                total,
                reset_in: Duration::from_millis(until - now),
                blocked: true,
            },
            _ if self.blocked || now >= self.window_reset_at => CategoryStatus::idle(total),
            _ => CategoryStatus {
                remaining: total.saturating_sub(self.count),
                total,
                reset_in: Duration::from_millis(self.window_reset_at - now),
                blocked: false,
            },
        }
    }
}

/// Diagnostic snapshot for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStatus {
    /// Admissions left in the current window.
    pub remaining: u32,
    /// Window capacity.
    pub total: u32,
    /// Time until the window or cooldown ends; zero when no window is running.
    #[serde(rename = "resetInMs", serialize_with = "serialize_millis")]
    pub reset_in: Duration,
    pub blocked: bool,
}

impl CategoryStatus {
    /// Status of a category with no running window.
    pub fn idle(total: u32) -> Self {
        Self { remaining: total, total, reset_in: Duration::ZERO, blocked: false }
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Owned category → state table.
#[derive(Debug, Default)]
pub struct WindowStore {
    states: RwLock<HashMap<Category, Arc<Mutex<WindowState>>>>,
}

impl WindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, category: &Category, init: impl FnOnce() -> WindowState) -> Arc<Mutex<WindowState>> {
        if let Some(slot) = self.states.read().unwrap_or_else(|e| e.into_inner()).get(category) {
            return slot.clone();
        }
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        states.entry(category.clone()).or_insert_with(|| Arc::new(Mutex::new(init()))).clone()
    }

    /// Run `f` with exclusive access to the category's state, creating it with `init` on first
    /// use.
    pub fn with_state<R>(
        &self,
        category: &Category,
        init: impl FnOnce() -> WindowState,
        f: impl FnOnce(&mut WindowState) -> R,
    ) -> R {
        let slot = self.slot(category, init);
        let mut state = slot.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Copy of every state created so far.
    pub fn snapshot(&self) -> Vec<(Category, WindowState)> {
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        states
            .iter()
            .map(|(category, slot)| (category.clone(), *slot.lock().unwrap_or_else(|e| e.into_inner())))
            .collect()
    }

    pub fn get(&self, category: &Category) -> Option<WindowState> {
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        states.get(category).map(|slot| *slot.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Forget one category; the next check starts it afresh.
    pub fn remove(&self, category: &Category) {
        self.states.write().unwrap_or_else(|e| e.into_inner()).remove(category);
    }

    pub fn clear(&self) {
        self.states.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.states.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
