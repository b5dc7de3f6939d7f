//! # LogWriter: forwards events to `tracing`
//!
//! A minimal subscriber that turns every [`Event`] into a `tracing` record.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO fanvisor: serve started capacity=4
//! INFO fanvisor: unit starting unit=0 operation="sort" in_flight=1
//! WARN fanvisor: unit failed unit=3 operation="sort" reason="operation failed: io"
//! WARN fanvisor: unit timed out unit=5 operation="sort" timeout_ms=500
//! INFO fanvisor: queue closed, draining
//! INFO fanvisor: all units drained
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let op = e.operation.as_deref();
        match e.kind {
            EventKind::ServeStarted => info!(capacity = ?e.in_flight, "serve started"),
            EventKind::QueueClosed => info!("queue closed, draining"),
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::AllDrained => info!("all units drained"),
            EventKind::GraceExceeded => warn!(reason = ?e.reason, "grace exceeded"),
            EventKind::UnitAdmitted => {
                debug!(unit = ?e.unit, operation = ?op, in_flight = ?e.in_flight, "unit admitted")
            }
            EventKind::UnitStarting => {
                info!(unit = ?e.unit, operation = ?op, in_flight = ?e.in_flight, "unit starting")
            }
            EventKind::UnitCompleted => info!(unit = ?e.unit, operation = ?op, "unit completed"),
            EventKind::UnitFailed => {
                warn!(unit = ?e.unit, operation = ?op, reason = ?e.reason, "unit failed")
            }
            EventKind::TimeoutHit => {
                warn!(unit = ?e.unit, operation = ?op, timeout_ms = ?e.timeout_ms, "unit timed out")
            }
            EventKind::UnitRejected => {
                warn!(operation = ?op, reason = ?e.reason, "unit rejected")
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = ?e.subscriber, reason = ?e.reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                warn!(subscriber = ?e.subscriber, reason = ?e.reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
