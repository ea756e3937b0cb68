//! Error types for the event bus.
//!
//! - [`BusError`] is returned by every fallible bus operation.
//! - [`HandlerFailure`] aggregates the handler faults of one concurrent
//!   publish round.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::id::SubscriptionId;

/// Errors produced by the event bus.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BusError {
    /// An argument violated a precondition (empty event name, malformed id,
    /// invalid configuration). Raised before any registry mutation.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the argument.
        reason: String,
    },

    /// The id does not name an active subscription on this bus.
    ///
    /// Covers ids that were never issued by this bus as well as ids that
    /// were already removed by `unsubscribe` or `clear`.
    #[error("unknown subscription: {id}")]
    UnknownSubscription {
        /// The rejected id.
        id: SubscriptionId,
    },

    /// A handler failed during a sequential publish. Handlers after it in
    /// the round were not invoked.
    #[error("handler '{handler}' ({subscription}) failed on event '{event}': {source}")]
    Handler {
        /// Event being dispatched.
        event: String,
        /// Subscription whose handler failed.
        subscription: SubscriptionId,
        /// Handler name.
        handler: String,
        /// The error returned by the handler.
        #[source]
        source: anyhow::Error,
    },

    /// One or more handlers failed during a concurrent publish. Every
    /// handler in the round ran to completion (or to the publish timeout).
    #[error(transparent)]
    HandlerFailure(#[from] HandlerFailure),
}

impl BusError {
    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use herald_events::{EventBus, HandlerResult};
    ///
    /// let bus: EventBus = EventBus::new();
    /// let err = bus
    ///     .subscribe("", |_: &str, _: &serde_json::Value| -> HandlerResult { Ok(()) })
    ///     .unwrap_err();
    /// assert_eq!(err.as_label(), "invalid_argument");
    /// ```
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::UnknownSubscription { .. } => "unknown_subscription",
            Self::Handler { .. } => "handler_error",
            Self::HandlerFailure(_) => "handler_failure",
        }
    }
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// How a single handler failed inside a concurrent publish round.
#[non_exhaustive]
#[derive(Debug)]
pub enum FaultKind {
    /// The handler returned an error.
    Error(anyhow::Error),
    /// The handler panicked.
    Panicked {
        /// Panic payload, if it was a string.
        message: String,
    },
    /// The handler was still running when the publish timeout elapsed and
    /// was aborted.
    TimedOut {
        /// The configured publish timeout.
        after: Duration,
    },
    /// The handler task was cancelled by the runtime before finishing.
    Cancelled,
}

impl FaultKind {
    /// Returns a short stable label (snake_case) for use in logs.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Error(_) => "error",
            Self::Panicked { .. } => "panicked",
            Self::TimedOut { .. } => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "error: {e:#}"),
            Self::Panicked { message } => write!(f, "panicked: {message}"),
            Self::TimedOut { after } => write!(f, "timed out after {after:?}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// One failed handler within a [`HandlerFailure`].
#[derive(Debug)]
pub struct HandlerFault {
    /// Subscription whose handler failed.
    pub subscription: SubscriptionId,
    /// Handler name.
    pub handler: String,
    /// What went wrong.
    pub kind: FaultKind,
}

impl fmt::Display for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({}) {}", self.handler, self.subscription, self.kind)
    }
}

/// Aggregate of every handler fault from one concurrent publish round.
///
/// Only raised after all handlers of the round have finished, so
/// `dispatched - faults.len()` handlers are known to have succeeded.
#[derive(Debug, Error)]
#[error("{} of {dispatched} handler(s) failed on event '{event}': {}", .faults.len(), summarize(.faults))]
pub struct HandlerFailure {
    /// Event that was published.
    pub event: String,
    /// Number of handlers dispatched in the round.
    pub dispatched: usize,
    /// Every fault, in subscription order.
    pub faults: Vec<HandlerFault>,
}

impl HandlerFailure {
    /// Number of handlers in the round that completed successfully.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.dispatched.saturating_sub(self.faults.len())
    }

    /// Returns the fault recorded for `id`, if its handler failed.
    #[must_use]
    pub fn fault_for(&self, id: SubscriptionId) -> Option<&HandlerFault> {
        self.faults.iter().find(|f| f.subscription == id)
    }
}

fn summarize(faults: &[HandlerFault]) -> String {
    faults
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
