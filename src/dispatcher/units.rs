//! # Unit tasks owned by one `serve` call.
//!
//! Wraps the `JoinSet` of running units together with the label of every task
//! still in it, so the serve loop can name stuck units without relying on the
//! (asynchronous) event stream.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::task::{self, JoinError, JoinSet};

use super::{report::ServeReport, runner::UnitOutcome};

/// Running unit tasks and their `operation#unit` labels.
#[derive(Default)]
pub(crate) struct UnitTasks {
    set: JoinSet<UnitOutcome>,
    labels: HashMap<task::Id, (u64, Arc<str>)>,
}

impl UnitTasks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Spawns a unit task and remembers its label until it is reaped.
    pub(crate) fn spawn<F>(&mut self, unit: u64, operation: Arc<str>, fut: F)
    where
        F: Future<Output = UnitOutcome> + Send + 'static,
    {
        let handle = self.set.spawn(fut);
        self.labels.insert(handle.id(), (unit, operation));
    }

    /// Reaps every task that already finished, without waiting.
    pub(crate) fn reap_finished(&mut self, report: &mut ServeReport) {
        while let Some(joined) = self.set.try_join_next_with_id() {
            self.reap(joined, report);
        }
    }

    /// Waits for every task to finish.
    ///
    /// Cancel safe: tasks reaped before the future is dropped stay accounted for.
    pub(crate) async fn drain(&mut self, report: &mut ServeReport) {
        while let Some(joined) = self.set.join_next_with_id().await {
            self.reap(joined, report);
        }
    }

    /// Aborts every remaining task and waits until they are gone.
    pub(crate) async fn abort_all(&mut self, report: &mut ServeReport) {
        self.set.abort_all();
        self.drain(report).await;
    }

    /// Labels of the tasks still running, ordered by unit number.
    pub(crate) fn stuck(&self) -> Vec<String> {
        let mut running: Vec<&(u64, Arc<str>)> = self.labels.values().collect();
        running.sort_unstable_by_key(|(unit, _)| *unit);
        running
            .into_iter()
            .map(|(unit, op)| format!("{op}#{unit}"))
            .collect()
    }

    fn reap(
        &mut self,
        joined: Result<(task::Id, UnitOutcome), JoinError>,
        report: &mut ServeReport,
    ) {
        let id = match &joined {
            Ok((id, _)) => *id,
            Err(e) => e.id(),
        };
        self.labels.remove(&id);
        report.record(joined.map(|(_, outcome)| outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_stuck_lists_only_unreaped_tasks() {
        let mut tasks = UnitTasks::new();
        let mut report = ServeReport::default();
        tasks.spawn(1, "slow".into(), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            UnitOutcome::Completed
        });
        tasks.spawn(0, "quick".into(), async { UnitOutcome::Failed });
        assert_eq!(tasks.stuck(), vec!["quick#0", "slow#1"]);

        tokio::time::sleep(Duration::from_millis(1)).await;
        tasks.reap_finished(&mut report);
        assert_eq!(report.failed, 1);
        assert_eq!(tasks.stuck(), vec!["slow#1"]);

        tasks.abort_all(&mut report).await;
        assert_eq!(report.aborted, 1);
        assert!(tasks.stuck().is_empty());
        assert!(tasks.set.is_empty());
    }
}
