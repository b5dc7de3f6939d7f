//! # Example: Bounded Serve
//!
//! Eight requests go through a queue of capacity 4 to a dispatcher that runs at
//! most 4 at a time. Each request "does something for a while".
//!
//! ```text
//! producer ── submit ×8 ──► [queue cap=4] ──► Dispatcher(max_outstanding=4)
//!                                               ├─ request 0..3 run
//!                                               └─ request 4..7 wait for a slot
//! ```
//!
//! Ctrl-C stops the loop early: queued requests are rejected and running ones
//! see their cancellation token fire.
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example bounded_serve
//! ```

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use fanvisor::{Dispatcher, OperationFn, OperationRef, WorkError, WorkUnit, queue};

const MAX_OUTSTANDING: usize = 4;
const REQUESTS: u32 = 8;

/// Sleeps for a while, or until cancelled.
fn do_something_for_a_while() -> OperationRef<u32, ()> {
    OperationFn::arc("do-something", |p: Vec<u32>, ctx: CancellationToken| async move {
        let id = p[0];
        info!(request = id, "doing something for a while...");
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(800)) => {
                info!(request = id, "that's that done");
                Ok(())
            }
            _ = ctx.cancelled() => Err(WorkError::Canceled),
        }
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

    let dispatcher = Dispatcher::new(MAX_OUTSTANDING)?;
    let (tx, rx) = queue::bounded(4)?;
    let op = do_something_for_a_while();

    let producer = tokio::spawn(async move {
        info!(requests = REQUESTS, limit = MAX_OUTSTANDING, "putting requests on the queue");
        for id in 0..REQUESTS {
            if queue::submit(&tx, WorkUnit::new([id], op.clone())).await.is_err() {
                break;
            }
        }
        // Dropping `tx` closes the queue; serve drains and returns.
    });

    let started = tokio::time::Instant::now();
    let report = dispatcher.serve_until_signal(rx).await?;
    producer.await?;

    info!(
        elapsed = ?started.elapsed(),
        completed = report.completed,
        failed = report.failed,
        rejected = report.rejected,
        reason = ?report.reason,
        "serve finished"
    );
    Ok(())
}
