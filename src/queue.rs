//! # Inbound queue: producers → dispatcher.
//!
//! [`unbounded`] and [`bounded`] create a [`Submitter`] (cloneable producer
//! handle) and an [`Inbound`] (consumed by [`Dispatcher::serve`](crate::Dispatcher::serve)).
//!
//! ## Rules
//! - FIFO: units are dequeued in submission order (per producer).
//! - The queue is **closed** once every `Submitter` is dropped (or the
//!   `Inbound` is closed); `serve` then drains what is buffered and stops.
//! - A bounded queue applies backpressure: [`Submitter::submit`] waits,
//!   [`Submitter::try_submit`] returns [`SubmitError::Full`].
//!
//! ## Example
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use tokio_util::sync::CancellationToken;
//! use fanvisor::{OperationFn, OperationRef, WorkError, WorkUnit, queue};
//!
//! let op: OperationRef<u8, ()> =
//!     OperationFn::arc("noop", |_p: Vec<u8>, _ctx: CancellationToken| async move {
//!         Ok::<(), WorkError>(())
//!     });
//!
//! let (tx, mut inbound) = queue::bounded::<u8, ()>(4).unwrap();
//! queue::submit(&tx, WorkUnit::new([1], op)).await.unwrap();
//! drop(tx);
//!
//! assert!(inbound.recv().await.is_some());
//! assert!(inbound.recv().await.is_none()); // closed and empty
//! # }
//! ```

use std::fmt;

use tokio::sync::mpsc;

use crate::error::{DispatchError, SubmitError};
use crate::work::WorkUnit;

/// Creates a queue without a capacity limit.
pub fn unbounded<A, R>() -> (Submitter<A, R>, Inbound<A, R>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Submitter {
            tx: Tx::Unbounded(tx),
        },
        Inbound {
            rx: Rx::Unbounded(rx),
        },
    )
}

/// Creates a queue holding at most `capacity` pending units.
///
/// Returns [`DispatchError::InvalidQueueCapacity`] for `0`.
pub fn bounded<A, R>(capacity: usize) -> Result<(Submitter<A, R>, Inbound<A, R>), DispatchError> {
    if capacity == 0 {
        return Err(DispatchError::InvalidQueueCapacity);
    }
    let (tx, rx) = mpsc::channel(capacity);
    Ok((
        Submitter {
            tx: Tx::Bounded(tx),
        },
        Inbound {
            rx: Rx::Bounded(rx),
        },
    ))
}

/// Enqueues `unit`, waiting for room on a bounded queue.
pub async fn submit<A, R>(queue: &Submitter<A, R>, unit: WorkUnit<A, R>) -> Result<(), SubmitError> {
    queue.submit(unit).await
}

enum Tx<A, R> {
    Bounded(mpsc::Sender<WorkUnit<A, R>>),
    Unbounded(mpsc::UnboundedSender<WorkUnit<A, R>>),
}

enum Rx<A, R> {
    Bounded(mpsc::Receiver<WorkUnit<A, R>>),
    Unbounded(mpsc::UnboundedReceiver<WorkUnit<A, R>>),
}

/// Producer handle of an inbound queue.
pub struct Submitter<A, R> {
    tx: Tx<A, R>,
}

impl<A, R> Submitter<A, R> {
    /// Enqueues a unit (async, waits if a bounded queue is full).
    ///
    /// On error the unit is dropped, which abandons its result handle.
    pub async fn submit(&self, unit: WorkUnit<A, R>) -> Result<(), SubmitError> {
        match &self.tx {
            Tx::Bounded(tx) => tx.send(unit).await.map_err(|_| SubmitError::Closed),
            Tx::Unbounded(tx) => tx.send(unit).map_err(|_| SubmitError::Closed),
        }
    }

    /// Enqueues a unit without waiting (fails if a bounded queue is full).
    pub fn try_submit(&self, unit: WorkUnit<A, R>) -> Result<(), SubmitError> {
        match &self.tx {
            Tx::Bounded(tx) => tx.try_send(unit).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SubmitError::Full,
                mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
            }),
            Tx::Unbounded(tx) => tx.send(unit).map_err(|_| SubmitError::Closed),
        }
    }

    /// True once the consuming side is closed or dropped.
    pub fn is_closed(&self) -> bool {
        match &self.tx {
            Tx::Bounded(tx) => tx.is_closed(),
            Tx::Unbounded(tx) => tx.is_closed(),
        }
    }
}

impl<A, R> Clone for Submitter<A, R> {
    fn clone(&self) -> Self {
        let tx = match &self.tx {
            Tx::Bounded(tx) => Tx::Bounded(tx.clone()),
            Tx::Unbounded(tx) => Tx::Unbounded(tx.clone()),
        };
        Self { tx }
    }
}

impl<A, R> fmt::Debug for Submitter<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submitter")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Consuming end of an inbound queue.
pub struct Inbound<A, R> {
    rx: Rx<A, R>,
}

impl<A, R> Inbound<A, R> {
    /// Receives the next unit; `None` once the queue is closed and empty.
    pub async fn recv(&mut self) -> Option<WorkUnit<A, R>> {
        match &mut self.rx {
            Rx::Bounded(rx) => rx.recv().await,
            Rx::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Takes a buffered unit without waiting.
    pub fn try_recv(&mut self) -> Option<WorkUnit<A, R>> {
        match &mut self.rx {
            Rx::Bounded(rx) => rx.try_recv().ok(),
            Rx::Unbounded(rx) => rx.try_recv().ok(),
        }
    }

    /// Stops accepting new units; buffered units can still be received.
    pub fn close(&mut self) {
        match &mut self.rx {
            Rx::Bounded(rx) => rx.close(),
            Rx::Unbounded(rx) => rx.close(),
        }
    }

    /// Number of buffered units.
    pub fn len(&self) -> usize {
        match &self.rx {
            Rx::Bounded(rx) => rx.len(),
            Rx::Unbounded(rx) => rx.len(),
        }
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A, R> fmt::Debug for Inbound<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbound").field("len", &self.len()).finish()
    }
}
