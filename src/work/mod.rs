//! # Work units and the operations they run.
//!
//! - [`Operation`] - opaque work capability (payload → result)
//! - [`OperationFn`] - closure-backed operation
//! - [`OperationRef`] - shared reference to an operation (`Arc<dyn Operation>`)
//! - [`WorkUnit`] - payload + operation + optional result sink
//! - [`ResultSink`] / [`ResultHandle`] - one-shot outcome delivery

mod operation;
mod sink;
mod unit;

pub use operation::{BoxWorkFuture, Operation, OperationFn, OperationRef};
pub use sink::{ResultHandle, ResultSink, result_channel};
pub use unit::WorkUnit;
