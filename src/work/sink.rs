//! # One-shot result delivery for work units.
//!
//! [`result_channel`] creates a write-once [`ResultSink`] (travels with the unit
//! into its task) and a [`ResultHandle`] (kept by the caller). The handle is a
//! future resolving to the unit's outcome.
//!
//! ## Rules
//! - The sink is consumed by [`ResultSink::deliver`], so it is written at most once.
//! - If the sink is dropped without a write (unit discarded), the handle resolves
//!   to [`WorkError::Abandoned`].
//! - Delivering to a dropped handle is not an error; the outcome is discarded.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::WorkError;

/// Creates a connected sink/handle pair.
///
/// # Example
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use fanvisor::{WorkError, result_channel};
///
/// let (sink, handle) = result_channel::<u32>();
/// sink.deliver(Ok(7));
/// assert_eq!(handle.await, Ok(7));
///
/// let (sink, handle) = result_channel::<u32>();
/// drop(sink);
/// assert_eq!(handle.await, Err(WorkError::Abandoned));
/// # }
/// ```
pub fn result_channel<R>() -> (ResultSink<R>, ResultHandle<R>) {
    let (tx, rx) = oneshot::channel();
    (ResultSink { tx }, ResultHandle { rx })
}

/// Write-once destination for a unit's outcome.
pub struct ResultSink<R> {
    tx: oneshot::Sender<Result<R, WorkError>>,
}

impl<R> ResultSink<R> {
    /// Writes the outcome. Returns `false` if the handle was already dropped.
    pub fn deliver(self, outcome: Result<R, WorkError>) -> bool {
        self.tx.send(outcome).is_ok()
    }

    /// True if the receiving handle is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<R> fmt::Debug for ResultSink<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSink")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Caller side of a result channel; resolves to the unit's outcome.
#[must_use = "a result handle does nothing unless awaited"]
pub struct ResultHandle<R> {
    rx: oneshot::Receiver<Result<R, WorkError>>,
}

impl<R> ResultHandle<R> {
    /// Returns the outcome if it has already been delivered.
    ///
    /// - `None` → still pending
    /// - `Some(Err(Abandoned))` → the sink was dropped unwritten
    pub fn try_outcome(&mut self) -> Option<Result<R, WorkError>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(WorkError::Abandoned)),
        }
    }
}

impl<R> Future for ResultHandle<R> {
    type Output = Result<R, WorkError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(WorkError::Abandoned)))
    }
}

impl<R> fmt::Debug for ResultHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle").finish_non_exhaustive()
    }
}
