//! # Run a single admitted unit.
//!
//! Executes one [`WorkUnit`] while holding its [`AdmissionPermit`], publishes
//! lifecycle events to the [`Bus`] and delivers the outcome to the unit's sink.
//!
//! ## Event flow
//! ```text
//! Success:
//!   operation.call() → Ok(r)  → publish UnitCompleted → sink.deliver(Ok(r))
//!
//! Failure:
//!   operation.call() → Err(e) → publish UnitFailed    → sink.deliver(Err(e))
//!
//! Panic:
//!   operation.call() panics → caught → publish UnitFailed → sink.deliver(Err(Panicked))
//!
//! Timeout:
//!   timeout exceeded → cancel child → publish TimeoutHit
//!                                   → publish UnitFailed (timeout)
//!                                   → sink.deliver(Err(Timeout))
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event: `UnitCompleted` or `UnitFailed`
//! - The permit is released after the outcome is delivered, on every path
//! - Panics never escape the unit task

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::{
    error::WorkError,
    events::{Bus, Event, EventKind},
    gate::AdmissionPermit,
    work::WorkUnit,
};

/// How a unit task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnitOutcome {
    Completed,
    Failed,
}

/// Executes `unit` to completion, then releases `permit`.
///
/// `ctx` is handed to the operation; it is cancelled on shutdown (via the
/// parent token) or when `timeout` expires.
pub(crate) async fn run_unit<A, R>(
    id: u64,
    unit: WorkUnit<A, R>,
    permit: AdmissionPermit,
    ctx: CancellationToken,
    timeout: Option<Duration>,
    bus: Bus,
) -> UnitOutcome
where
    A: Send + 'static,
    R: Send + 'static,
{
    let (payload, operation, sink) = unit.into_parts();
    let name: std::sync::Arc<str> = operation.name().into();

    bus.publish(
        Event::new(EventKind::UnitStarting)
            .with_unit(id)
            .with_operation(name.clone())
            .with_in_flight(permit.in_flight()),
    );

    let op_ctx = ctx.clone();
    let call = AssertUnwindSafe(async move { operation.call(payload, op_ctx).await }).catch_unwind();
    let caught = match timeout {
        Some(dur) => match time::timeout(dur, call).await {
            Ok(r) => r,
            Err(_elapsed) => {
                ctx.cancel();
                bus.publish(
                    Event::new(EventKind::TimeoutHit)
                        .with_unit(id)
                        .with_operation(name.clone())
                        .with_timeout(dur),
                );
                Ok(Err(WorkError::Timeout { timeout: dur }))
            }
        },
        None => call.await,
    };
    let res = caught.unwrap_or_else(|panic| Err(WorkError::from_panic(panic)));

    let outcome = match &res {
        Ok(_) => {
            bus.publish(
                Event::new(EventKind::UnitCompleted)
                    .with_unit(id)
                    .with_operation(name),
            );
            UnitOutcome::Completed
        }
        Err(e) => {
            bus.publish(
                Event::new(EventKind::UnitFailed)
                    .with_unit(id)
                    .with_operation(name)
                    .with_reason(e.to_string()),
            );
            UnitOutcome::Failed
        }
    };

    if let Some(sink) = sink {
        sink.deliver(res);
    }
    drop(permit);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::AdmissionGate;
    use crate::work::{OperationFn, OperationRef};

    #[tokio::test]
    async fn test_success_delivers_and_releases() {
        let gate = AdmissionGate::new(1).unwrap();
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let op: OperationRef<u32, u32> =
            OperationFn::arc("sum", |v: Vec<u32>, _ctx: CancellationToken| async move {
                Ok::<u32, WorkError>(v.iter().sum())
            });
        let (unit, handle) = WorkUnit::new(vec![1u32, 2, 3], op).with_reply();

        let permit = gate.try_acquire().unwrap();
        let out = run_unit(0, unit, permit, CancellationToken::new(), None, bus).await;

        assert_eq!(out, UnitOutcome::Completed);
        assert_eq!(handle.await, Ok(6));
        assert_eq!(gate.available(), 1);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::UnitStarting);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::UnitCompleted);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let gate = AdmissionGate::new(1).unwrap();
        let op: OperationRef<u8, ()> =
            OperationFn::arc("boom", |_v: Vec<u8>, _ctx: CancellationToken| async move {
                if true {
                    panic!("exploded");
                }
                Ok::<(), WorkError>(())
            });
        let (unit, handle) = WorkUnit::new(Vec::<u8>::new(), op).with_reply();

        let permit = gate.try_acquire().unwrap();
        let out = run_unit(0, unit, permit, CancellationToken::new(), None, Bus::new(4)).await;

        assert_eq!(out, UnitOutcome::Failed);
        assert_eq!(
            handle.await,
            Err(WorkError::Panicked {
                info: "exploded".into()
            })
        );
        assert_eq!(gate.held(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_operation_context() {
        let gate = AdmissionGate::new(1).unwrap();
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let ctx = CancellationToken::new();
        let op: OperationRef<u8, ()> =
            OperationFn::arc("slow", |_v: Vec<u8>, _ctx: CancellationToken| async move {
                time::sleep(Duration::from_secs(60)).await;
                Ok::<(), WorkError>(())
            });
        let (unit, handle) = WorkUnit::new(Vec::<u8>::new(), op).with_reply();

        let permit = gate.try_acquire().unwrap();
        let dur = Duration::from_millis(50);
        let out = run_unit(3, unit, permit, ctx.clone(), Some(dur), bus).await;

        assert_eq!(out, UnitOutcome::Failed);
        assert!(ctx.is_cancelled());
        assert_eq!(handle.await, Err(WorkError::Timeout { timeout: dur }));

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok().map(|e| e.kind)).collect();
        assert_eq!(
            kinds,
            vec![EventKind::UnitStarting, EventKind::TimeoutHit, EventKind::UnitFailed]
        );
    }
}
