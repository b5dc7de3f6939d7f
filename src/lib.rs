//! # fanvisor
//!
//! **Fanvisor** is a bounded concurrent dispatcher for Rust.
//!
//! It pulls work units off a queue and runs each one in its own task, never
//! more than `max_outstanding` at a time, and it provides a single-use
//! completion signal for "start it in the background, wait for it later".
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producer(s)                         caller
//!       │ submit(WorkUnit)                 │ handle.await
//!       ▼                                  │
//! ┌─────────────┐                          │
//! │  Submitter  │──► Inbound queue         │
//! └─────────────┘        │                 │
//!                        ▼                 │
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Dispatcher::serve (one loop)                                     │
//! │  - AdmissionGate (counting semaphore, capacity = max_outstanding) │
//! │  - JoinSet of unit tasks                                          │
//! │  - shutdown CancellationToken (explicit or OS signal)             │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │ unit #0  │       │ unit #1  │  ...  │ unit #N  │   each owns its unit
//!   │ +permit  │       │ +permit  │       │ +permit  │   and its gate permit
//!   └────┬─────┘       └────┬─────┘       └────┬─────┘
//!        │ outcome ─► ResultSink ─────────────────────────────► ResultHandle
//!        │
//!        │ Publishes: UnitStarting, UnitCompleted, UnitFailed, TimeoutHit, ...
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                  Bus (broadcast channel)                          │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber listener   │
//!                       └───┬────────────────┬───┘
//!                           ▼                ▼
//!                   InFlightTracker    SubscriberSet
//!                                  ┌─────────┼─────────┐
//!                                  ▼         ▼         ▼
//!                             sub1.on   sub2.on   subN.on
//!                              _event()  _event()  _event()
//! ```
//!
//! ### Unit lifecycle
//! ```text
//! dequeued ──► acquire permit ──► UnitAdmitted ──► spawn(task owns unit + permit)
//!                   │
//!                   └─ shutdown while waiting ──► UnitRejected (sink: Canceled)
//!
//! task:
//!   ├─► UnitStarting
//!   ├─► operation.call(payload, ctx)   (optional timeout, panics caught)
//!   ├─► UnitCompleted | UnitFailed
//!   ├─► sink.deliver(outcome)
//!   └─► permit dropped ──► slot returned to the gate
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                        |
//! |-------------------|--------------------------------------------------------------|-------------------------------------------|
//! | **Dispatch**      | Bounded fan-out of queued units with graceful shutdown.      | [`Dispatcher`], [`ServeReport`]           |
//! | **Admission**     | Counting limiter with RAII permits.                          | [`AdmissionGate`], [`AdmissionPermit`]    |
//! | **Work**          | Operations, units and per-unit result delivery.              | [`Operation`], [`WorkUnit`], [`ResultHandle`] |
//! | **Queue**         | Bounded or unbounded multi-producer inbound queue.           | [`Submitter`], [`Inbound`]                |
//! | **Completion**    | One-shot "background work finished" rendezvous.              | [`completion::pair`], [`run_alongside`]   |
//! | **Subscriber API**| Hook into unit lifecycle events.                             | [`Subscribe`], [`InFlightTracker`]        |
//! | **Errors**        | Typed errors for setup, units, producers and the serve loop. | [`DispatchError`], [`WorkError`], [`RuntimeError`] |
//! | **Configuration** | Centralize runtime settings.                                 | [`DispatcherConfig`]                      |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use fanvisor::{Dispatcher, OperationFn, OperationRef, WorkError, WorkUnit, queue};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Dispatcher::new(4)?;
//!
//!     let work: OperationRef<u32, u32> =
//!         OperationFn::arc("work", |p: Vec<u32>, _ctx: CancellationToken| async move {
//!             tokio::time::sleep(Duration::from_millis(5)).await;
//!             Ok::<_, WorkError>(p.iter().sum::<u32>())
//!         });
//!
//!     let (tx, rx) = queue::bounded(4)?;
//!     let producer = tokio::spawn(async move {
//!         let mut handles = Vec::new();
//!         for i in 0..8u32 {
//!             let (unit, handle) = WorkUnit::new([i, i], work.clone()).with_reply();
//!             queue::submit(&tx, unit).await.ok();
//!             handles.push(handle);
//!         }
//!         handles
//!     });
//!
//!     let report = dispatcher.serve(rx).await?;
//!     assert_eq!(report.completed, 8);
//!
//!     for (i, handle) in producer.await?.into_iter().enumerate() {
//!         assert_eq!(handle.await, Ok(2 * i as u32));
//!     }
//!     Ok(())
//! }
//! ```
pub mod completion;
mod config;
mod dispatcher;
mod error;
mod events;
mod gate;
pub mod queue;
mod subscribers;
mod work;

// ---- Public re-exports ----

pub use completion::{Signaller, Waiter, run_alongside, run_with_completion_signal};
pub use config::DispatcherConfig;
pub use dispatcher::{Dispatcher, DispatcherBuilder, ServeReport, StopReason};
pub use error::{DispatchError, RuntimeError, SignalError, SubmitError, WorkError};
pub use events::{Event, EventKind};
pub use gate::{AdmissionGate, AdmissionPermit};
pub use queue::{Inbound, Submitter, submit};
pub use subscribers::{InFlightTracker, Subscribe};
pub use work::{
    BoxWorkFuture, Operation, OperationFn, OperationRef, ResultHandle, ResultSink, WorkUnit,
    result_channel,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
