//! # Runtime events emitted by the dispatcher and its unit tasks.
//!
//! The [`EventKind`] enum classifies events across three groups:
//! - **Serve events**: loop lifecycle (started, queue closed, shutdown, drained)
//! - **Unit events**: one unit's path through the gate (admitted, starting, completed, failed, ...)
//! - **Subscriber events**: delivery problems (overflow, panic)
//!
//! The [`Event`] struct carries metadata such as the unit number, operation
//! name, gate occupancy and failure reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are delivered
//! out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use fanvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::UnitFailed)
//!     .with_unit(7)
//!     .with_operation("resize")
//!     .with_reason("boom")
//!     .with_timeout(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::UnitFailed);
//! assert_eq!(ev.unit, Some(7));
//! assert_eq!(ev.operation.as_deref(), Some("resize"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Serve loop ===
    /// `serve` entered its loop.
    ///
    /// Sets: `in_flight` (gate capacity)
    ServeStarted,

    /// Inbound queue reported closed and empty; draining in-flight units.
    QueueClosed,

    /// Shutdown requested (token cancelled or OS signal observed).
    ShutdownRequested,

    /// All in-flight units finished; `serve` is about to return.
    AllDrained,

    /// Grace period exceeded after shutdown; remaining units were aborted.
    GraceExceeded,

    // === Unit lifecycle ===
    /// Unit took a gate slot and its task is being spawned.
    ///
    /// Sets: `unit`, `operation`, `in_flight`
    UnitAdmitted,

    /// Unit's operation is about to run.
    ///
    /// Sets: `unit`, `operation`, `in_flight`
    UnitStarting,

    /// Operation returned successfully.
    ///
    /// Sets: `unit`, `operation`
    UnitCompleted,

    /// Operation failed (error, timeout, cancellation or panic).
    ///
    /// Sets: `unit`, `operation`, `reason`
    UnitFailed,

    /// Operation exceeded the per-unit timeout (always followed by `UnitFailed`).
    ///
    /// Sets: `unit`, `operation`, `timeout_ms`
    TimeoutHit,

    /// Unit was dequeued (or left in the queue) but dropped because of shutdown.
    ///
    /// Sets: `operation`, `reason`
    UnitRejected,

    // === Subscribers ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `subscriber`, `reason`
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `subscriber`, `reason`
    SubscriberPanicked,
}

impl EventKind {
    /// True for the last event `serve` publishes.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::AllDrained | EventKind::GraceExceeded)
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Dispatch number of the unit (0-based, per `serve` call).
    pub unit: Option<u64>,
    /// Operation name, if applicable.
    pub operation: Option<Arc<str>>,
    /// Gate slots held when the event was published.
    pub in_flight: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Per-unit timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Subscriber name (subscriber events only).
    pub subscriber: Option<&'static str>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            unit: None,
            operation: None,
            in_flight: None,
            reason: None,
            timeout_ms: None,
            subscriber: None,
        }
    }

    /// Attaches the unit's dispatch number.
    #[inline]
    pub fn with_unit(mut self, unit: u64) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Attaches an operation name.
    #[inline]
    pub fn with_operation(mut self, operation: impl Into<Arc<str>>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Attaches gate occupancy.
    #[inline]
    pub fn with_in_flight(mut self, n: usize) -> Self {
        self.in_flight = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"));
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.subscriber = Some(subscriber);
        ev
    }

    /// `operation#unit` label, or just the operation name.
    pub fn unit_label(&self) -> Option<String> {
        match (self.operation.as_deref(), self.unit) {
            (Some(op), Some(id)) => Some(format!("{op}#{id}")),
            (Some(op), None) => Some(op.to_string()),
            (None, Some(id)) => Some(format!("#{id}")),
            (None, None) => None,
        }
    }
}
