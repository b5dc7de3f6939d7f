//! # Example: Completion Signal
//!
//! Start a sort in the background, do something else meanwhile, then wait for
//! the sort to signal that it finished.
//!
//! ```text
//! main ── spawn(sort; signal_once) ──► background
//!   │
//!   ├─ do something for a while (3 units of time)
//!   │                                   sort finishes after 2 units
//!   └─ await_once() ◄──────────────────── signal
//! ```
//!
//! The second half shows the same rendezvous with the explicit
//! [`completion::pair`] halves.
//!
//! ## Run
//! ```bash
//! cargo run --example completion_signal
//! ```

use std::time::Duration;

use tracing::info;

use fanvisor::{completion, run_alongside};

async fn pretend_sort(list: &mut [i64]) {
    info!(len = list.len(), "phew... sorting some stuff, be right back");
    tokio::time::sleep(Duration::from_millis(200)).await;
    list.sort_unstable();
    info!("ok, that's that sorted");
}

async fn do_something_for_a_while() {
    info!("doing something for a while");
    tokio::time::sleep(Duration::from_millis(300)).await;
    info!("that's that done");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let started = tokio::time::Instant::now();
    run_alongside(
        async {
            let mut list = vec![5, -3, 9, 0, 12, -8];
            pretend_sort(&mut list).await;
            info!(?list, "sorted list");
        },
        do_something_for_a_while(),
    )
    .await?;
    // Both ran at once: roughly max(200ms, 300ms), not the sum.
    info!(elapsed = ?started.elapsed(), "background sort and foreground work both finished");

    let (done, waiter) = completion::pair();
    tokio::spawn(async move {
        let mut list: Vec<i64> = (0..10).rev().collect();
        pretend_sort(&mut list).await;
        done.signal_once();
    });
    do_something_for_a_while().await;
    waiter.await_once().await?;
    info!("waited for the explicit signal");

    Ok(())
}
