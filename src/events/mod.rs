//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the serve loop, `runner::run_unit`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the per-serve subscriber listener (fans out to `SubscriberSet`,
//!   which includes the `InFlightTracker`) and receivers from `Dispatcher::events()`.

mod bus;
mod event;

pub(crate) use bus::Bus;
pub use event::{Event, EventKind};
