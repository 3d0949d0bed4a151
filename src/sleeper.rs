//! Abstraction over waiting between retry attempts.
//!
//! Production code sleeps on the tokio timer; tests either skip the wait, record it, or advance a
//! [`ManualClock`] so cooldowns expire exactly when the retry engine would have woken up.

use crate::clock::ManualClock;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Abstraction for sleeping/waiting
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// Production sleeper using tokio runtime
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Test sleeper that doesn't actually sleep
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantSleeper;

impl Sleeper for InstantSleeper {
    fn sleep(&self, _duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async {})
    }
}

/// Test sleeper that records every requested delay and returns immediately.
#[derive(Debug, Clone, Default)]
pub struct TrackingSleeper {
    calls: Arc<Mutex<Vec<Duration>>>,
}

impl TrackingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// All delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of waits performed.
    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn call_at(&self, idx: usize) -> Option<Duration> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).get(idx).copied()
    }

    /// Sum of every requested delay.
    pub fn total(&self) -> Duration {
        self.delays().into_iter().sum()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn record(&self, duration: Duration) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(duration);
    }
}

impl Sleeper for TrackingSleeper {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        self.record(duration);
        Box::pin(async {})
    }
}

/// Test sleeper that advances a [`ManualClock`] by the requested delay.
///
/// Pairs a retry policy with a governor sharing the same clock: the wait "happens" instantly
/// but windows and cooldowns observe the elapsed time.
#[derive(Debug, Clone)]
pub struct ClockSleeper {
    clock: ManualClock,
    tracker: TrackingSleeper,
}

impl ClockSleeper {
    pub fn new(clock: ManualClock) -> Self {
        Self { clock, tracker: TrackingSleeper::new() }
    }

    /// Delays observed so far.
    pub fn delays(&self) -> Vec<Duration> {
        self.tracker.delays()
    }
}

impl Sleeper for ClockSleeper {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        self.tracker.record(duration);
        self.clock.advance(duration);
        Box::pin(async {})
    }
}
