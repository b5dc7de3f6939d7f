//! # In-flight unit tracker with sequence-based ordering.
//!
//! Maintains which units are currently executing, using event sequence numbers
//! to reject stale updates.
//!
//! ## Architecture
//! ```text
//! unit task ──► Bus ──► subscriber listener ──► SubscriberSet ──► InFlightTracker::update()
//!                                                                        │
//!                                                                        ▼
//!                                                       HashMap<u64, Running{seq, operation}>
//! ```
//!
//! ## Rules
//! - Only `UnitStarting` / `UnitCompleted` / `UnitFailed` change state
//! - A finishing event removes the entry only if it is newer than the start
//! - Reads (`snapshot`, `is_running`, `len`) are **eventually consistent**

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Per-unit state.
#[derive(Debug, Clone)]
struct Running {
    /// Sequence number of the `UnitStarting` event.
    seq: u64,
    /// Operation name, for labels.
    operation: Option<Arc<str>>,
}

/// Thread-safe tracker of running units.
///
/// Fed from the event bus, so it may trail the serve loop by a few events;
/// [`Dispatcher::in_flight`](crate::Dispatcher::in_flight) hands it out for
/// monitoring.
#[derive(Default)]
pub struct InFlightTracker {
    state: RwLock<HashMap<u64, Running>>,
}

impl InFlightTracker {
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an event; returns `true` if it changed the state.
    ///
    /// ```text
    /// update(UnitStarting,  unit=3, seq=10) → running
    /// update(UnitCompleted, unit=3, seq=12) → removed
    /// update(UnitFailed,    unit=3, seq=9)  → rejected (older than the start)
    /// ```
    pub async fn update(&self, ev: &Event) -> bool {
        let Some(unit) = ev.unit else {
            return false;
        };

        match ev.kind {
            EventKind::UnitStarting => {
                let mut state = self.state.write().await;
                state.insert(
                    unit,
                    Running {
                        seq: ev.seq,
                        operation: ev.operation.clone(),
                    },
                );
                true
            }
            EventKind::UnitCompleted | EventKind::UnitFailed => {
                let mut state = self.state.write().await;
                match state.get(&unit) {
                    Some(run) if run.seq < ev.seq => {
                        state.remove(&unit);
                        true
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Returns sorted `operation#unit` labels of running units.
    pub async fn snapshot(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut ids: Vec<(&u64, &Running)> = state.iter().collect();
        ids.sort_unstable_by_key(|(id, _)| **id);
        ids.into_iter()
            .map(|(id, run)| match run.operation.as_deref() {
                Some(op) => format!("{op}#{id}"),
                None => format!("#{id}"),
            })
            .collect()
    }

    /// True if the unit is currently running.
    pub async fn is_running(&self, unit: u64) -> bool {
        self.state.read().await.contains_key(&unit)
    }

    /// Number of running units.
    pub async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    /// True if no unit is running.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.is_empty()
    }
}

#[async_trait]
impl Subscribe for InFlightTracker {
    async fn on_event(&self, ev: &Event) {
        self.update(ev).await;
    }

    fn name(&self) -> &'static str {
        "in-flight-tracker"
    }

    fn queue_capacity(&self) -> usize {
        4096
    }
}
