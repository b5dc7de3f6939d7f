//! # Work unit: one immutable request.
//!
//! A [`WorkUnit`] bundles a payload, the [`Operation`](super::Operation) to run
//! over it and an optional [`ResultSink`]. Builder methods consume the unit, so
//! nothing can change it after it has been handed to a queue.
//!
//! ## Ownership
//! ```text
//! producer ──build──► WorkUnit ──submit(move)──► queue ──recv(move)──► serve loop
//!                                                                  │
//!                                            spawn(async move { unit ... })
//! ```
//! Every hop is a move; a spawned task owns exactly the unit it was spawned
//! for and never reads a binding the serve loop reassigns later.

use std::fmt;

use super::operation::OperationRef;
use super::sink::{ResultHandle, ResultSink, result_channel};

/// One unit of submitted work plus its optional result destination.
pub struct WorkUnit<A, R> {
    payload: Vec<A>,
    operation: OperationRef<A, R>,
    sink: Option<ResultSink<R>>,
}

impl<A: 'static, R: 'static> WorkUnit<A, R> {
    /// Creates a unit without a result sink (fire-and-forget).
    pub fn new(payload: impl Into<Vec<A>>, operation: OperationRef<A, R>) -> Self {
        Self {
            payload: payload.into(),
            operation,
            sink: None,
        }
    }

    /// Attaches an existing sink.
    pub fn with_sink(mut self, sink: ResultSink<R>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Attaches a fresh sink and returns the matching handle.
    ///
    /// # Example
    /// ```
    /// use tokio_util::sync::CancellationToken;
    /// use fanvisor::{OperationFn, OperationRef, WorkError, WorkUnit};
    ///
    /// let echo: OperationRef<u8, u8> =
    ///     OperationFn::arc("echo", |p: Vec<u8>, _ctx: CancellationToken| async move {
    ///         Ok::<u8, WorkError>(p[0])
    ///     });
    /// let (unit, _handle) = WorkUnit::new([9], echo).with_reply();
    /// assert!(unit.has_sink());
    /// assert_eq!(unit.payload(), &[9]);
    /// ```
    pub fn with_reply(self) -> (Self, ResultHandle<R>) {
        let (sink, handle) = result_channel();
        (self.with_sink(sink), handle)
    }

    /// The payload this unit will be executed with.
    pub fn payload(&self) -> &[A] {
        &self.payload
    }

    /// Name of the operation.
    pub fn operation_name(&self) -> &str {
        self.operation.name()
    }

    /// True if the outcome will be reported somewhere.
    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Splits the unit for execution.
    pub(crate) fn into_parts(self) -> (Vec<A>, OperationRef<A, R>, Option<ResultSink<R>>) {
        (self.payload, self.operation, self.sink)
    }
}

impl<A: fmt::Debug + 'static, R: 'static> fmt::Debug for WorkUnit<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkUnit")
            .field("operation", &self.operation.name())
            .field("payload", &self.payload)
            .field("has_sink", &self.has_sink())
            .finish()
    }
}
