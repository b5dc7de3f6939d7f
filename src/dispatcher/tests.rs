use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use super::{Dispatcher, StopReason};
use crate::{
    DispatchError, DispatcherConfig, Event, EventKind, OperationFn, OperationRef, RuntimeError,
    SubmitError, Subscribe, WorkError, WorkUnit, queue,
};

/// Records current and peak concurrency of an operation.
#[derive(Default)]
struct Overlap {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Overlap {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Echoes its first payload item after `dur`, tracking overlap.
fn sleeper(overlap: Arc<Overlap>, dur: Duration) -> OperationRef<u64, u64> {
    OperationFn::arc("sleep", move |p: Vec<u64>, _ctx: CancellationToken| {
        let overlap = Arc::clone(&overlap);
        async move {
            overlap.enter();
            time::sleep(dur).await;
            overlap.exit();
            Ok::<u64, WorkError>(p[0])
        }
    })
}

/// Waits on the cancellation token, ignoring the payload.
fn cooperative() -> OperationRef<u64, ()> {
    OperationFn::arc("cooperative", |_p: Vec<u64>, ctx: CancellationToken| async move {
        ctx.cancelled().await;
        Err::<(), WorkError>(WorkError::Canceled)
    })
}

/// Ignores cancellation and sleeps for an hour.
fn stubborn() -> OperationRef<u64, ()> {
    OperationFn::arc("stubborn", |_p: Vec<u64>, _ctx: CancellationToken| async move {
        time::sleep(Duration::from_secs(3600)).await;
        Ok::<(), WorkError>(())
    })
}

async fn wait_for(events: &mut tokio::sync::broadcast::Receiver<Event>, kind: EventKind, n: usize) {
    let mut seen = 0;
    while seen < n {
        if events.recv().await.unwrap().kind == kind {
            seen += 1;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_bound_never_exceeded() {
    let overlap = Arc::new(Overlap::default());
    let op = sleeper(overlap.clone(), Duration::from_millis(100));
    let d = Dispatcher::new(4).unwrap();
    let (tx, rx) = queue::unbounded();
    for i in 0..20u64 {
        tx.submit(WorkUnit::new([i], op.clone())).await.unwrap();
    }
    drop(tx);

    let start = Instant::now();
    let report = d.serve(rx).await.unwrap();

    assert_eq!(overlap.peak(), 4);
    assert_eq!(report.dispatched, 20);
    assert_eq!(report.completed, 20);
    assert_eq!(report.reason, StopReason::QueueClosed);
    // Five waves of four.
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bound_holds_on_parallel_runtime() {
    let overlap = Arc::new(Overlap::default());
    let op = sleeper(overlap.clone(), Duration::from_millis(5));
    let d = Dispatcher::new(4).unwrap();
    let (tx, rx) = queue::bounded(4).unwrap();

    let producer = tokio::spawn(async move {
        for i in 0..20u64 {
            queue::submit(&tx, WorkUnit::new([i], op.clone())).await.unwrap();
        }
    });
    let report = d.serve(rx).await.unwrap();
    producer.await.unwrap();

    assert!(overlap.peak() <= 4);
    assert!(overlap.peak() >= 1);
    assert_eq!(report.completed, 20);
}

#[tokio::test]
async fn test_every_unit_runs_exactly_once() {
    let counters: Arc<Vec<AtomicUsize>> = Arc::new((0..50).map(|_| AtomicUsize::new(0)).collect());
    let c = Arc::clone(&counters);
    let bump: OperationRef<usize, ()> =
        OperationFn::arc("bump", move |p: Vec<usize>, _ctx: CancellationToken| {
            let c = Arc::clone(&c);
            async move {
                c[p[0]].fetch_add(1, Ordering::SeqCst);
                Ok::<(), WorkError>(())
            }
        });

    let d = Dispatcher::new(4).unwrap();
    let (tx, rx) = queue::unbounded();
    for i in 0..50usize {
        tx.try_submit(WorkUnit::new([i], bump.clone())).unwrap();
    }
    drop(tx);
    d.serve(rx).await.unwrap();

    for (i, c) in counters.iter().enumerate() {
        assert_eq!(c.load(Ordering::SeqCst), 1, "unit {i}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_each_task_owns_its_unit() {
    let echo: OperationRef<u64, u64> =
        OperationFn::arc("echo", |p: Vec<u64>, _ctx: CancellationToken| async move {
            time::sleep(Duration::from_millis((99 - p[0]) % 7)).await;
            Ok::<u64, WorkError>(p[0])
        });

    let d = Dispatcher::new(4).unwrap();
    let (tx, rx) = queue::unbounded();
    let mut handles = Vec::new();
    for i in 0..100u64 {
        let (unit, handle) = WorkUnit::new([i], echo.clone()).with_reply();
        tx.submit(unit).await.unwrap();
        handles.push(handle);
    }
    drop(tx);
    d.serve(rx).await.unwrap();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await, Ok(i as u64));
    }
}

#[tokio::test]
async fn test_gate_balanced_after_failures() {
    let flaky: OperationRef<u32, u32> =
        OperationFn::arc("flaky", |p: Vec<u32>, _ctx: CancellationToken| async move {
            tokio::task::yield_now().await;
            match p[0] % 3 {
                0 => Err(WorkError::fail(format!("unit {} failed", p[0]))),
                _ => Ok(p[0]),
            }
        });

    let d = Dispatcher::new(4).unwrap();
    let (tx, rx) = queue::unbounded();
    let mut handles = Vec::new();
    for i in 0..30u32 {
        let (unit, handle) = WorkUnit::new([i], flaky.clone()).with_reply();
        tx.submit(unit).await.unwrap();
        handles.push(handle);
    }
    drop(tx);
    let report = d.serve(rx).await.unwrap();

    assert_eq!(report.completed, 20);
    assert_eq!(report.failed, 10);
    assert_eq!(d.available(), 4);
    assert_eq!(d.held(), 0);
    assert_eq!(
        handles.remove(3).await,
        Err(WorkError::fail("unit 3 failed"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_single_slot_preserves_submission_order() {
    let finished = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&finished);
    let op: OperationRef<u64, ()> =
        OperationFn::arc("ordered", move |p: Vec<u64>, _ctx: CancellationToken| {
            let log = Arc::clone(&log);
            async move {
                time::sleep(Duration::from_millis(10)).await;
                log.lock().unwrap().push(p[0]);
                Ok::<(), WorkError>(())
            }
        });

    let d = Dispatcher::new(1).unwrap();
    let (tx, rx) = queue::unbounded();
    for i in 0..10u64 {
        tx.submit(WorkUnit::new([i], op.clone())).await.unwrap();
    }
    drop(tx);
    d.serve(rx).await.unwrap();

    let order = finished.lock().unwrap().clone();
    assert_eq!(order, (0..10).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_panicking_operation_releases_slot() {
    let op: OperationRef<u32, u32> =
        OperationFn::arc("fragile", |p: Vec<u32>, _ctx: CancellationToken| async move {
            if p[0] == 1 {
                panic!("unit 1 exploded");
            }
            Ok::<u32, WorkError>(p[0])
        });

    let d = Dispatcher::new(2).unwrap();
    let (tx, rx) = queue::unbounded();
    let mut handles = Vec::new();
    for i in 0..3u32 {
        let (unit, handle) = WorkUnit::new([i], op.clone()).with_reply();
        tx.submit(unit).await.unwrap();
        handles.push(handle);
    }
    drop(tx);
    let report = d.serve(rx).await.unwrap();

    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(d.available(), 2);

    let results: Vec<_> = futures::future::join_all(handles).await;
    assert_eq!(results[0], Ok(0));
    assert_eq!(
        results[1],
        Err(WorkError::Panicked {
            info: "unit 1 exploded".into()
        })
    );
    assert_eq!(results[2], Ok(2));
}

#[tokio::test(start_paused = true)]
async fn test_configured_timeout_fails_slow_units() {
    let op: OperationRef<u64, u64> =
        OperationFn::arc("maybe-slow", |p: Vec<u64>, _ctx: CancellationToken| async move {
            time::sleep(Duration::from_millis(p[0])).await;
            Ok::<u64, WorkError>(p[0])
        });

    let mut cfg = DispatcherConfig::with_max_outstanding(2);
    cfg.timeout = Duration::from_millis(50);
    let d = Dispatcher::builder(cfg).build().unwrap();
    let mut events = d.events();

    let (tx, rx) = queue::unbounded();
    let (fast, fast_handle) = WorkUnit::new([10u64], op.clone()).with_reply();
    let (slow, slow_handle) = WorkUnit::new([10_000u64], op).with_reply();
    tx.submit(fast).await.unwrap();
    tx.submit(slow).await.unwrap();
    drop(tx);

    let report = d.serve(rx).await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(fast_handle.await, Ok(10));
    let err = slow_handle.await.unwrap_err();
    assert!(err.is_timeout());

    wait_for(&mut events, EventKind::TimeoutHit, 1).await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_without_queue_close() {
    let d = Arc::new(Dispatcher::new(1).unwrap());
    let mut events = d.events();
    let (tx, rx) = queue::unbounded();

    let mut handles = Vec::new();
    for i in 0..3u64 {
        let (unit, handle) = WorkUnit::new([i], cooperative()).with_reply();
        tx.submit(unit).await.unwrap();
        handles.push(handle);
    }

    let server = tokio::spawn({
        let d = Arc::clone(&d);
        async move { d.serve(rx).await }
    });
    wait_for(&mut events, EventKind::UnitStarting, 1).await;

    // The producer still holds `tx`; only shutdown ends the loop.
    d.shutdown();
    let report = server.await.unwrap().unwrap();

    assert_eq!(report.reason, StopReason::Shutdown);
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.rejected, 2);
    assert_eq!(d.available(), 1);
    assert!(d.gate_closed());
    for handle in handles {
        assert_eq!(handle.await, Err(WorkError::Canceled));
    }
    assert_eq!(
        tx.submit(WorkUnit::new([9u64], cooperative())).await,
        Err(SubmitError::Closed)
    );
}

#[tokio::test(start_paused = true)]
async fn test_grace_exceeded_aborts_stuck_units() {
    let mut cfg = DispatcherConfig::with_max_outstanding(2);
    cfg.grace = Duration::from_millis(100);
    let d = Arc::new(Dispatcher::builder(cfg).build().unwrap());
    let mut events = d.events();
    let (tx, rx) = queue::unbounded();
    let mut handles = Vec::new();
    for i in 0..2u64 {
        let (unit, handle) = WorkUnit::new([i], stubborn()).with_reply();
        tx.submit(unit).await.unwrap();
        handles.push(handle);
    }

    let server = tokio::spawn({
        let d = Arc::clone(&d);
        async move { d.serve(rx).await }
    });
    wait_for(&mut events, EventKind::UnitStarting, 2).await;
    d.shutdown();

    match server.await.unwrap() {
        Err(RuntimeError::GraceExceeded { grace, stuck }) => {
            assert_eq!(grace, Duration::from_millis(100));
            assert_eq!(stuck, vec!["stubborn#0", "stubborn#1"]);
        }
        other => panic!("expected GraceExceeded, got {other:?}"),
    }
    assert_eq!(d.available(), 2);
    for handle in handles {
        assert_eq!(handle.await, Err(WorkError::Abandoned));
    }
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_drain_honours_grace() {
    let mut cfg = DispatcherConfig::with_max_outstanding(1);
    cfg.grace = Duration::from_millis(100);
    let d = Arc::new(Dispatcher::builder(cfg).build().unwrap());
    let mut events = d.events();
    let (tx, rx) = queue::unbounded();
    let (unit, handle) = WorkUnit::new([0u64], stubborn()).with_reply();
    tx.submit(unit).await.unwrap();
    drop(tx);

    let server = tokio::spawn({
        let d = Arc::clone(&d);
        async move { d.serve(rx).await }
    });
    wait_for(&mut events, EventKind::QueueClosed, 1).await;

    let start = Instant::now();
    d.shutdown();
    match time::timeout(Duration::from_secs(1), server).await {
        Ok(Ok(Err(RuntimeError::GraceExceeded { grace, stuck }))) => {
            assert_eq!(grace, Duration::from_millis(100));
            assert_eq!(stuck, vec!["stubborn#0"]);
        }
        other => panic!("expected GraceExceeded within a second, got {other:?}"),
    }
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(d.gate_closed());
    assert_eq!(handle.await, Err(WorkError::Abandoned));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_drain_cancels_running_units() {
    let d = Arc::new(Dispatcher::new(2).unwrap());
    let mut events = d.events();
    let (tx, rx) = queue::unbounded();
    let mut handles = Vec::new();
    for i in 0..2u64 {
        let (unit, handle) = WorkUnit::new([i], cooperative()).with_reply();
        tx.submit(unit).await.unwrap();
        handles.push(handle);
    }
    drop(tx);

    let server = tokio::spawn({
        let d = Arc::clone(&d);
        async move { d.serve(rx).await }
    });
    wait_for(&mut events, EventKind::QueueClosed, 1).await;
    d.shutdown();

    let report = server.await.unwrap().unwrap();
    assert_eq!(report.reason, StopReason::Shutdown);
    assert_eq!(report.dispatched, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(report.rejected, 0);
    for handle in handles {
        assert_eq!(handle.await, Err(WorkError::Canceled));
    }
}

#[tokio::test(start_paused = true)]
async fn test_stuck_units_named_when_events_are_lost() {
    let mut cfg = DispatcherConfig::with_max_outstanding(2);
    cfg.grace = Duration::ZERO;
    cfg.bus_capacity = 1;
    let d = Arc::new(Dispatcher::builder(cfg).build().unwrap());
    let (tx, rx) = queue::unbounded();
    for i in 0..2u64 {
        tx.submit(WorkUnit::new([i], stubborn())).await.unwrap();
    }

    let server = tokio::spawn({
        let d = Arc::clone(&d);
        async move { d.serve(rx).await }
    });
    while d.held() < 2 {
        tokio::task::yield_now().await;
    }
    d.shutdown();

    match server.await.unwrap() {
        Err(RuntimeError::GraceExceeded { grace, stuck }) => {
            assert_eq!(grace, Duration::ZERO);
            assert_eq!(stuck, vec!["stubborn#0", "stubborn#1"]);
        }
        other => panic!("expected GraceExceeded, got {other:?}"),
    }
    assert_eq!(d.held(), 0);
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn test_slot_accessors_follow_running_units() {
    let d = Arc::new(Dispatcher::new(3).unwrap());
    assert_eq!((d.capacity(), d.available(), d.held()), (3, 3, 0));

    let mut events = d.events();
    let (tx, rx) = queue::unbounded();
    for i in 0..2u64 {
        tx.submit(WorkUnit::new([i], cooperative())).await.unwrap();
    }
    let server = tokio::spawn({
        let d = Arc::clone(&d);
        async move { d.serve(rx).await }
    });
    wait_for(&mut events, EventKind::UnitStarting, 2).await;
    assert_eq!((d.capacity(), d.available(), d.held()), (3, 1, 2));
    assert!(!d.gate_closed());

    d.shutdown();
    server.await.unwrap().unwrap();
    assert_eq!((d.capacity(), d.available(), d.held()), (3, 3, 0));
    assert!(d.gate_closed());
    drop(tx);
}

#[test]
fn test_zero_capacity_rejected() {
    assert!(matches!(
        Dispatcher::new(0),
        Err(DispatchError::InvalidCapacity { got: 0, .. })
    ));
}

#[tokio::test]
async fn test_serve_runs_once() {
    let d = Dispatcher::new(1).unwrap();
    let (tx, rx) = queue::unbounded::<u8, ()>();
    drop(tx);
    let report = d.serve(rx).await.unwrap();
    assert_eq!(report.dispatched, 0);

    let (_tx, rx) = queue::unbounded::<u8, ()>();
    assert!(matches!(d.serve(rx).await, Err(RuntimeError::AlreadyServing)));
}

#[derive(Default)]
struct KindCounter {
    starting: AtomicUsize,
    completed: AtomicUsize,
}

#[async_trait]
impl Subscribe for KindCounter {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::UnitStarting => self.starting.fetch_add(1, Ordering::SeqCst),
            EventKind::UnitCompleted => self.completed.fetch_add(1, Ordering::SeqCst),
            _ => 0,
        };
    }

    fn name(&self) -> &'static str {
        "kind-counter"
    }
}

#[tokio::test]
async fn test_subscribers_see_every_unit_before_serve_returns() {
    let counter = Arc::new(KindCounter::default());
    let d = Dispatcher::builder(DispatcherConfig::default())
        .with_subscriber(counter.clone())
        .build()
        .unwrap();
    let mut events = d.events();

    let op = sleeper(Arc::new(Overlap::default()), Duration::from_millis(1));
    let (tx, rx) = queue::unbounded();
    for i in 0..10u64 {
        tx.submit(WorkUnit::new([i], op.clone())).await.unwrap();
    }
    drop(tx);
    d.serve(rx).await.unwrap();

    assert_eq!(counter.starting.load(Ordering::SeqCst), 10);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 10);
    assert!(d.in_flight().is_empty().await);

    assert_eq!(events.recv().await.unwrap().kind, EventKind::ServeStarted);
    let mut last = None;
    while let Ok(ev) = events.try_recv() {
        last = Some(ev.kind);
    }
    assert_eq!(last, Some(EventKind::AllDrained));
}
