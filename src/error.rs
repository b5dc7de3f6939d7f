//! Error types used by the dispatcher, its work units and the completion signal.
//!
//! This module defines:
//!
//! - [`DispatchError`]: configuration rejected at construction time.
//! - [`WorkError`]: outcome of a failed work unit (reported through its result sink).
//! - [`SubmitError`]: enqueue failures seen by producers.
//! - [`SignalError`]: a completion signal that can never arrive.
//! - [`RuntimeError`]: failures of the serve loop itself.
//!
//! Every enum provides `as_label` (stable snake_case label for logs/metrics).

use std::any::Any;
use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

/// # Configuration errors.
///
/// Returned eagerly by constructors; the component is not created.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The concurrency limit must be at least 1 (and fit the semaphore).
    #[error("max_outstanding must be in 1..={max}, got {got}")]
    InvalidCapacity {
        /// The rejected value.
        got: usize,
        /// Largest accepted value.
        max: usize,
    },

    /// A bounded inbound queue needs room for at least one unit.
    #[error("bounded queue capacity must be at least 1")]
    InvalidQueueCapacity,
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use fanvisor::DispatchError;
    ///
    /// let err = DispatchError::InvalidQueueCapacity;
    /// assert_eq!(err.as_label(), "dispatch_invalid_queue_capacity");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::InvalidCapacity { .. } => "dispatch_invalid_capacity",
            DispatchError::InvalidQueueCapacity => "dispatch_invalid_queue_capacity",
        }
    }
}

/// # Errors produced by a single work unit.
///
/// These never escape the serve loop. They are delivered through the unit's
/// result sink (when it has one) and published as `UnitFailed` events.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkError {
    /// The operation reported a failure.
    #[error("operation failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The operation exceeded the per-unit timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// The unit was cancelled by dispatcher shutdown (before or during execution).
    #[error("cancelled by shutdown")]
    Canceled,

    /// The operation panicked; the panic was contained at the task boundary.
    #[error("operation panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// The unit was dropped without ever producing an outcome.
    #[error("unit dropped before producing a result")]
    Abandoned,
}

impl WorkError {
    /// Shorthand for [`WorkError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use fanvisor::WorkError;
    ///
    /// let err = WorkError::fail("disk full");
    /// assert_eq!(err.to_string(), "operation failed: disk full");
    /// ```
    pub fn fail(error: impl Display) -> Self {
        WorkError::Fail {
            error: error.to_string(),
        }
    }

    /// Converts a caught panic payload into [`WorkError::Panicked`].
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        WorkError::Panicked {
            info: panic_message(payload.as_ref()),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkError::Fail { .. } => "work_failed",
            WorkError::Timeout { .. } => "work_timeout",
            WorkError::Canceled => "work_canceled",
            WorkError::Panicked { .. } => "work_panicked",
            WorkError::Abandoned => "work_abandoned",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            WorkError::Fail { error } => format!("error: {error}"),
            WorkError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            WorkError::Canceled => "cancelled by shutdown".to_string(),
            WorkError::Panicked { info } => format!("panic: {info}"),
            WorkError::Abandoned => "abandoned".to_string(),
        }
    }

    /// True for [`WorkError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, WorkError::Timeout { .. })
    }
}

/// Error returned when enqueueing a work unit.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Bounded queue is full (try again later or use async `submit`).
    #[error("inbound queue full")]
    Full,

    /// The consuming side of the queue is gone or closed.
    #[error("inbound queue closed")]
    Closed,
}

impl SubmitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubmitError::Full => "submit_full",
            SubmitError::Closed => "submit_closed",
        }
    }
}

/// Error returned by [`Waiter::await_once`](crate::completion::Waiter::await_once).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalError {
    /// The signalling half was dropped without signalling (background work died).
    #[error("completion signal abandoned before it was sent")]
    Abandoned,
}

impl SignalError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SignalError::Abandoned => "signal_abandoned",
        }
    }
}

/// # Errors produced by the serve loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// `serve` was already called on this dispatcher.
    #[error("dispatcher is already serving or has stopped")]
    AlreadyServing,

    /// In-flight units did not finish within the grace period after shutdown and were aborted.
    #[error("shutdown grace {grace:?} exceeded; stuck: {stuck:?}; aborted remaining units")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Units that were still running (`operation#unit`).
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use fanvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyServing => "runtime_already_serving",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// Renders a panic payload (`&'static str` or `String`) as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_rendering() {
        let s: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(s.as_ref()), "boom");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(
            WorkError::from_panic(owned),
            WorkError::Panicked {
                info: "owned boom".into()
            }
        );

        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(WorkError::Canceled.as_label(), "work_canceled");
        assert_eq!(WorkError::Abandoned.as_label(), "work_abandoned");
        assert_eq!(SubmitError::Full.as_label(), "submit_full");
        assert_eq!(SignalError::Abandoned.as_label(), "signal_abandoned");
        assert_eq!(
            DispatchError::InvalidCapacity { got: 0, max: 1 }.as_label(),
            "dispatch_invalid_capacity"
        );
    }

    #[test]
    fn test_timeout_classification() {
        let t = WorkError::Timeout {
            timeout: Duration::from_millis(50),
        };
        assert!(t.is_timeout());
        assert_eq!(t.as_message(), "timeout: 50ms");
        assert!(!WorkError::fail("x").is_timeout());
    }
}
