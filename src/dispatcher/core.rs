//! # Dispatcher: bounded fan-out of queued work units.
//!
//! The [`Dispatcher`] owns the admission gate, the event bus and the
//! subscribers. [`Dispatcher::serve`] pulls units from an [`Inbound`] queue and
//! runs each in its own task, never more than `max_outstanding` at a time.
//!
//! ## High-level architecture
//! ```text
//! Submitter ── submit(unit) ──► Inbound
//!                                  │
//!                                  ▼
//! serve():
//!   loop {
//!     reap finished tasks (try_join_next_with_id)
//!     unit   = select! { shutdown.cancelled(), inbound.recv() }
//!     permit = gate.acquire_cancellable(shutdown)          ← only point that bounds concurrency
//!     tasks.spawn(run_unit(id, unit, permit, child_token)) ← unit and permit moved in
//!   }
//!
//! Queue closed:
//!   publish(QueueClosed) → join every task → publish(AllDrained) → Ok(report)
//!                            └─ shutdown while joining → shutdown path below
//!
//! Shutdown path:
//!   shutdown token cancelled (Dispatcher::shutdown or OS signal)
//!     └─► publish(ShutdownRequested), close the gate
//!     └─► close inbound, reject buffered units (sinks get WorkError::Canceled)
//!     └─► child tokens cancelled → operations observe ctx.cancelled()
//!     └─► wait_all_with_grace(cfg.grace):
//!            ├─ all joined         → publish(AllDrained)   → Ok(report)
//!            └─ grace exceeded     → abort_all, publish(GraceExceeded)
//!                                    → Err(GraceExceeded { stuck })
//! ```
//!
//! ## Event flow
//! ```text
//! serve loop / unit tasks ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet
//!                                                 └──► Dispatcher::events() receivers
//! ```
//! The listener stops after the terminal event (`AllDrained` / `GraceExceeded`);
//! `serve` waits for it, so every subscriber has seen every event on return.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{
    report::{ServeReport, StopReason},
    runner, shutdown,
    units::UnitTasks,
};
use crate::{
    config::DispatcherConfig,
    error::{DispatchError, RuntimeError, WorkError},
    events::{Bus, Event, EventKind},
    gate::AdmissionGate,
    queue::Inbound,
    subscribers::{InFlightTracker, Subscribe, SubscriberSet},
    work::WorkUnit,
};

/// Bounded concurrent dispatcher.
///
/// One dispatcher serves one queue; a second [`serve`](Self::serve) call
/// returns [`RuntimeError::AlreadyServing`].
pub struct Dispatcher {
    cfg: DispatcherConfig,
    gate: AdmissionGate,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    in_flight: Arc<InFlightTracker>,
    shutdown: CancellationToken,
    started: AtomicBool,
}

impl Dispatcher {
    /// Creates a dispatcher with default settings and the given concurrency limit.
    ///
    /// # Example
    /// ```
    /// use fanvisor::{DispatchError, Dispatcher};
    ///
    /// let d = Dispatcher::new(4).unwrap();
    /// assert_eq!(d.capacity(), 4);
    /// assert_eq!(d.available(), 4);
    /// assert!(matches!(Dispatcher::new(0), Err(DispatchError::InvalidCapacity { .. })));
    /// ```
    pub fn new(max_outstanding: usize) -> Result<Self, DispatchError> {
        Self::builder(DispatcherConfig::with_max_outstanding(max_outstanding)).build()
    }

    /// Starts building a dispatcher from `cfg`.
    pub fn builder(cfg: DispatcherConfig) -> super::DispatcherBuilder {
        super::DispatcherBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: DispatcherConfig,
        gate: AdmissionGate,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self {
            cfg,
            gate,
            bus,
            subscribers,
            in_flight: Arc::new(InFlightTracker::new()),
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Maximum number of units running at once.
    pub fn capacity(&self) -> usize {
        self.gate.capacity()
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.gate.available()
    }

    /// Units currently holding a slot.
    pub fn held(&self) -> usize {
        self.gate.held()
    }

    #[cfg(test)]
    pub(super) fn gate_closed(&self) -> bool {
        self.gate.is_closed()
    }

    /// The settings this dispatcher was built with.
    pub fn config(&self) -> &DispatcherConfig {
        &self.cfg
    }

    /// Tracker of currently running units.
    pub fn in_flight(&self) -> Arc<InFlightTracker> {
        Arc::clone(&self.in_flight)
    }

    /// Subscribes to the raw event stream.
    ///
    /// Only events published after this call are observed.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Requests shutdown: the serve loop stops pulling units and running
    /// operations see their cancellation token fire.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Token cancelled on shutdown; cancel it to trigger shutdown from elsewhere.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs the serve loop until the queue is closed and drained, or until
    /// shutdown is requested.
    ///
    /// Operation failures never end the loop; they are reported through the
    /// unit's sink and as `UnitFailed` events.
    ///
    /// # Example
    /// ```
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// use tokio_util::sync::CancellationToken;
    /// use fanvisor::{Dispatcher, OperationFn, OperationRef, WorkError, WorkUnit, queue};
    ///
    /// let square: OperationRef<u64, u64> =
    ///     OperationFn::arc("square", |p: Vec<u64>, _ctx: CancellationToken| async move {
    ///         Ok::<_, WorkError>(p[0] * p[0])
    ///     });
    ///
    /// let d = Dispatcher::new(2).unwrap();
    /// let (tx, rx) = queue::unbounded();
    /// let (unit, handle) = WorkUnit::new([7u64], square).with_reply();
    /// tx.submit(unit).await.unwrap();
    /// drop(tx);
    ///
    /// let report = d.serve(rx).await.unwrap();
    /// assert_eq!(report.completed, 1);
    /// assert_eq!(handle.await, Ok(49));
    /// # }
    /// ```
    pub async fn serve<A, R>(&self, mut inbound: Inbound<A, R>) -> Result<ServeReport, RuntimeError>
    where
        A: Send + 'static,
        R: Send + 'static,
    {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyServing);
        }
        let listener = self.subscriber_listener();
        self.bus
            .publish(Event::new(EventKind::ServeStarted).with_in_flight(self.gate.capacity()));

        let mut report = ServeReport::default();
        let mut tasks = UnitTasks::new();
        let reason = self.dispatch_loop(&mut inbound, &mut tasks, &mut report).await;
        report.reason = reason;

        let res = match reason {
            StopReason::QueueClosed => {
                self.bus.publish(Event::new(EventKind::QueueClosed));
                let drained = tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => false,
                    _ = tasks.drain(&mut report) => true,
                };
                if drained {
                    self.bus.publish(Event::new(EventKind::AllDrained));
                    Ok(())
                } else {
                    report.reason = StopReason::Shutdown;
                    self.begin_shutdown();
                    self.wait_all_with_grace(&mut tasks, &mut report).await
                }
            }
            StopReason::Shutdown => {
                self.begin_shutdown();
                self.reject_pending(&mut inbound, &mut report);
                self.wait_all_with_grace(&mut tasks, &mut report).await
            }
        };

        if let Err(e) = listener.await {
            warn!(error = %e, "subscriber listener ended abnormally");
        }
        res.map(|()| report)
    }

    /// Like [`serve`](Self::serve), but an OS termination signal also triggers
    /// shutdown.
    pub async fn serve_until_signal<A, R>(
        &self,
        inbound: Inbound<A, R>,
    ) -> Result<ServeReport, RuntimeError>
    where
        A: Send + 'static,
        R: Send + 'static,
    {
        let watcher = shutdown::cancel_on_termination(self.shutdown.clone());
        let res = self.serve(inbound).await;
        watcher.abort();
        res
    }

    /// Pulls units and spawns one task per admitted unit until the queue is
    /// closed or shutdown is requested.
    async fn dispatch_loop<A, R>(
        &self,
        inbound: &mut Inbound<A, R>,
        tasks: &mut UnitTasks,
        report: &mut ServeReport,
    ) -> StopReason
    where
        A: Send + 'static,
        R: Send + 'static,
    {
        let mut next_id: u64 = 0;
        loop {
            tasks.reap_finished(report);

            let unit = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return StopReason::Shutdown,
                unit = inbound.recv() => match unit {
                    Some(unit) => unit,
                    None => return StopReason::QueueClosed,
                },
            };

            let Some(permit) = self.gate.acquire_cancellable(&self.shutdown).await else {
                // The gate is only closed after the loop exits, so a refused
                // permit must come from the shutdown token.
                debug_assert!(
                    self.shutdown.is_cancelled(),
                    "admission gate closed while serving"
                );
                if !self.shutdown.is_cancelled() {
                    warn!("admission gate closed while serving; shutting down");
                    self.shutdown.cancel();
                }
                self.reject(unit, report);
                return StopReason::Shutdown;
            };

            let id = next_id;
            next_id += 1;
            report.dispatched += 1;
            self.bus.publish(
                Event::new(EventKind::UnitAdmitted)
                    .with_unit(id)
                    .with_operation(unit.operation_name())
                    .with_in_flight(permit.in_flight()),
            );
            let operation: Arc<str> = unit.operation_name().into();
            let run = runner::run_unit(
                id,
                unit,
                permit,
                self.shutdown.child_token(),
                self.cfg.unit_timeout(),
                self.bus.clone(),
            );
            tasks.spawn(id, operation, run);
        }
    }

    /// Drops a unit that will never run; its sink reports [`WorkError::Canceled`].
    fn reject<A: 'static, R: 'static>(&self, unit: WorkUnit<A, R>, report: &mut ServeReport) {
        report.rejected += 1;
        self.bus.publish(
            Event::new(EventKind::UnitRejected)
                .with_operation(unit.operation_name())
                .with_reason("shutdown"),
        );
        let (_, _, sink) = unit.into_parts();
        if let Some(sink) = sink {
            sink.deliver(Err(WorkError::Canceled));
        }
    }

    /// Closes the queue and rejects everything still buffered in it.
    fn reject_pending<A: 'static, R: 'static>(
        &self,
        inbound: &mut Inbound<A, R>,
        report: &mut ServeReport,
    ) {
        inbound.close();
        while let Some(unit) = inbound.try_recv() {
            self.reject(unit, report);
        }
    }

    /// Announces shutdown and stops the gate from issuing further permits.
    ///
    /// Permits already held stay valid and still return their slot on drop.
    fn begin_shutdown(&self) {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.gate.close();
    }

    /// Waits for all unit tasks to finish within the configured grace period.
    ///
    /// Publishes [`EventKind::AllDrained`] on success, or
    /// [`EventKind::GraceExceeded`] on timeout, aborts the remaining tasks and
    /// returns [`RuntimeError::GraceExceeded`] with the units that were stuck.
    async fn wait_all_with_grace(
        &self,
        tasks: &mut UnitTasks,
        report: &mut ServeReport,
    ) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        let drained = time::timeout(grace, tasks.drain(report)).await;

        match drained {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllDrained));
                Ok(())
            }
            Err(_) => {
                let stuck = tasks.stuck();
                tasks.abort_all(report).await;
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_reason(format!("stuck: [{}]", stuck.join(", "))),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Subscribes to the bus and forwards events to a fresh [`SubscriberSet`]
    /// until the terminal event, then flushes the subscribers.
    fn subscriber_listener(&self) -> JoinHandle<()> {
        let mut subs = self.subscribers.clone();
        subs.push(self.in_flight.clone());
        let set = SubscriberSet::new(subs, self.bus.clone());
        let mut rx = self.bus.subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        let terminal = ev.kind.is_terminal();
                        set.emit_arc(Arc::new(ev));
                        if terminal {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            set.shutdown().await;
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cfg", &self.cfg)
            .field("gate", &self.gate)
            .field("subscribers", &self.subscribers.len())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish()
    }
}
