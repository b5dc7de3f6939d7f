//! # Event subscribers for the dispatcher.
//!
//! This module provides the [`Subscribe`] trait and built-in implementations for
//! handling runtime events broadcast through the internal bus.
//!
//! ## Architecture
//! ```text
//! unit task ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet
//!                                                                     │
//!                                              ┌──────────────┬───────┴──────┐
//!                                              ▼              ▼              ▼
//!                                       InFlightTracker   LogWriter    user subscribers
//! ```
//!
//! ## Subscriber types
//! - **Passive subscribers**: observe and react to events (logging, metrics, alerts)
//! - **Stateful subscribers**: maintain internal state based on events ([`InFlightTracker`])

mod in_flight;
#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

pub use in_flight::InFlightTracker;
#[cfg(feature = "logging")]
pub use log::LogWriter;
pub(crate) use set::SubscriberSet;
pub use subscribe::Subscribe;
