//! # Example: Result Sinks
//!
//! Each request carries its arguments, the function to apply and a place to
//! put the answer. Some requests fail, one panics, one is too slow; every
//! caller still gets an outcome, and the built-in [`LogWriter`] traces the
//! dispatcher's events.
//!
//! ## Run
//! ```bash
//! cargo run --example result_sink --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fanvisor::{
    Dispatcher, DispatcherConfig, LogWriter, OperationFn, OperationRef, Subscribe, WorkError,
    WorkUnit, queue,
};

fn sum() -> OperationRef<i64, i64> {
    OperationFn::arc("sum", |args: Vec<i64>, _ctx: CancellationToken| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, WorkError>(args.iter().sum::<i64>())
    })
}

/// Fails on an empty argument list and panics on overflow.
fn product() -> OperationRef<i64, i64> {
    OperationFn::arc("product", |args: Vec<i64>, _ctx: CancellationToken| async move {
        if args.is_empty() {
            return Err(WorkError::fail("product of nothing"));
        }
        let p = args
            .iter()
            .try_fold(1i64, |acc, x| acc.checked_mul(*x))
            .unwrap_or_else(|| panic!("product overflowed"));
        Ok(p)
    })
}

fn slow() -> OperationRef<i64, i64> {
    OperationFn::arc("slow", |args: Vec<i64>, _ctx: CancellationToken| async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, WorkError>(args.len() as i64)
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut cfg = DispatcherConfig::with_max_outstanding(4);
    cfg.timeout = Duration::from_millis(500);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let dispatcher = Dispatcher::builder(cfg).with_subscribers(subs).build()?;

    let requests: Vec<(&str, Vec<i64>, OperationRef<i64, i64>)> = vec![
        ("sum 1..=10", (1..=10).collect(), sum()),
        ("product 1..=5", (1..=5).collect(), product()),
        ("product of nothing", vec![], product()),
        ("product overflow", vec![i64::MAX, 2], product()),
        ("slow", vec![1, 2, 3], slow()),
        ("sum negatives", vec![-4, -6], sum()),
    ];

    let (tx, rx) = queue::bounded(4)?;
    let producer = tokio::spawn(async move {
        let mut pending = Vec::new();
        for (label, args, op) in requests {
            let (unit, handle) = WorkUnit::new(args, op).with_reply();
            if queue::submit(&tx, unit).await.is_err() {
                break;
            }
            pending.push((label, handle));
        }
        pending
    });

    let report = dispatcher.serve(rx).await?;
    for (label, handle) in producer.await? {
        match handle.await {
            Ok(value) => info!(request = label, value, "answer"),
            Err(e) => warn!(request = label, kind = e.as_label(), error = %e, "no answer"),
        }
    }
    info!(?report, "done");
    Ok(())
}
