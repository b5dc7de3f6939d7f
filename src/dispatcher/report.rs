//! # Summary of one `serve` call.

use tokio::task::JoinError;

use super::runner::UnitOutcome;

/// Why the serve loop stopped pulling units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// Every submitter was dropped and the queue was empty.
    #[default]
    QueueClosed,
    /// [`Dispatcher::shutdown`](crate::Dispatcher::shutdown) was called or an OS
    /// signal arrived.
    Shutdown,
}

/// Counters collected by [`Dispatcher::serve`](crate::Dispatcher::serve).
///
/// `dispatched == completed + failed + aborted` once `serve` returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeReport {
    /// Units that were admitted and handed to a task.
    pub dispatched: u64,
    /// Units whose operation returned `Ok`.
    pub completed: u64,
    /// Units whose operation failed, timed out, panicked or was cancelled.
    pub failed: u64,
    /// Units dropped on shutdown without running.
    pub rejected: u64,
    /// Units aborted after the shutdown grace period.
    pub aborted: u64,
    /// Why the loop stopped.
    pub reason: StopReason,
}

impl ServeReport {
    /// Accounts for one reaped unit task.
    pub(crate) fn record(&mut self, joined: Result<UnitOutcome, JoinError>) {
        match joined {
            Ok(UnitOutcome::Completed) => self.completed += 1,
            Ok(UnitOutcome::Failed) => self.failed += 1,
            Err(e) if e.is_cancelled() => self.aborted += 1,
            Err(_) => self.failed += 1,
        }
    }
}
