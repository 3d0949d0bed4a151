//! Event vocabulary.

use crate::category::Category;
use crate::outcome::Outcome;
use std::fmt;
use std::time::Duration;

/// Something the governor or retry engine decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GovernorEvent {
    /// Admission granted; the request went to the network.
    Admitted { category: Category },
    /// Admission denied; a synthetic 429 was returned.
    LocallyBlocked { category: Category, retry_after: Duration },
    /// The server answered 429 and the category entered its cooldown.
    ServerBlocked { category: Category, retry_after: Duration },
    /// A failed attempt will be retried after `delay`.
    RetryScheduled {
        /// 1-indexed number of the attempt about to be made.
        attempt: usize,
        delay: Duration,
    },
    /// The retry engine stopped and surfaced the last error.
    RetryGaveUp {
        attempts: usize,
        /// False when the predicate rejected the error, true when attempts ran out.
        exhausted: bool,
    },
}

impl GovernorEvent {
    /// Category the event refers to, if any.
    pub fn category(&self) -> Option<&Category> {
        match self {
            GovernorEvent::Admitted { category }
            | GovernorEvent::LocallyBlocked { category, .. }
            | GovernorEvent::ServerBlocked { category, .. } => Some(category),
            GovernorEvent::RetryScheduled { .. } | GovernorEvent::RetryGaveUp { .. } => None,
        }
    }
}

impl From<Outcome> for GovernorEvent {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Admitted { category } => GovernorEvent::Admitted { category },
            Outcome::LocallyBlocked { category, retry_after } => {
                GovernorEvent::LocallyBlocked { category, retry_after }
            }
            Outcome::ServerBlocked { category, retry_after } => {
                GovernorEvent::ServerBlocked { category, retry_after }
            }
        }
    }
}

impl fmt::Display for GovernorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GovernorEvent::Admitted { category } => write!(f, "Admitted({})", category),
            GovernorEvent::LocallyBlocked { category, retry_after } => {
                write!(f, "LocallyBlocked({}, retry_after={:?})", category, retry_after)
            }
            GovernorEvent::ServerBlocked { category, retry_after } => {
                write!(f, "ServerBlocked({}, retry_after={:?})", category, retry_after)
            }
            GovernorEvent::RetryScheduled { attempt, delay } => {
                write!(f, "RetryScheduled(#{}, delay={:?})", attempt, delay)
            }
            GovernorEvent::RetryGaveUp { attempts, exhausted } => {
                write!(f, "RetryGaveUp(attempts={}, exhausted={})", attempts, exhausted)
            }
        }
    }
}
