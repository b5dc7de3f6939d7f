//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging custom event handlers into
//! the dispatcher. Each subscriber is driven by a dedicated worker loop fed by a
//! bounded queue owned by the dispatcher's subscriber set.
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching); they do **not** block the
//!   serve loop, unit tasks, or other subscribers.
//! - Each subscriber declares its preferred queue capacity via
//!   [`Subscribe::queue_capacity`]. On overflow, events for that subscriber are
//!   **dropped** and a `SubscriberOverflow` event is published.

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// # Example
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use async_trait::async_trait;
/// use fanvisor::{Event, EventKind, Subscribe};
///
/// #[derive(Default)]
/// struct FailureCounter(AtomicUsize);
///
/// #[async_trait]
/// impl Subscribe for FailureCounter {
///     async fn on_event(&self, ev: &Event) {
///         if ev.kind == EventKind::UnitFailed {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
///     fn name(&self) -> &'static str { "failure-counter" }
/// }
/// ```
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
