//! # Completion signal: start background work, wait for it later.
//!
//! A single-use rendezvous between one background task and one waiter.
//!
//! ```text
//! caller                           background task
//!   │  pair() ──► (Signaller, Waiter)
//!   │  spawn(work + Signaller) ─────────► work...
//!   │  other work...                      │
//!   │  waiter.await_once() ─── blocks     │
//!   │                                     ▼
//!   │◄──────────────────────────── signaller.signal_once()
//!   ▼  continue
//! ```
//!
//! ## Rules
//! - Both halves are consumed on use, so a signal is written once and read once.
//! - The signal carries no data.
//! - A [`Signaller`] dropped without signalling (the background task failed or
//!   panicked) makes [`Waiter::await_once`] return [`SignalError::Abandoned`]
//!   instead of blocking forever.

use std::future::Future;

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::SignalError;

/// Creates a connected signaller/waiter pair.
///
/// # Example
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use fanvisor::completion;
///
/// let (done, waiter) = completion::pair();
/// tokio::spawn(async move {
///     // long-running work
///     done.signal_once();
/// });
/// waiter.await_once().await.unwrap();
/// # }
/// ```
pub fn pair() -> (Signaller, Waiter) {
    let (tx, rx) = oneshot::channel();
    (Signaller { tx }, Waiter { rx })
}

/// Producer half, owned by the background task.
#[derive(Debug)]
pub struct Signaller {
    tx: oneshot::Sender<()>,
}

impl Signaller {
    /// Marks the background work as finished.
    pub fn signal_once(self) {
        // A gone waiter is not an error.
        let _ = self.tx.send(());
    }
}

/// Consumer half, owned by the caller.
#[derive(Debug)]
pub struct Waiter {
    rx: oneshot::Receiver<()>,
}

impl Waiter {
    /// Waits until [`Signaller::signal_once`] has run.
    ///
    /// Returns immediately if the signal was already sent.
    pub async fn await_once(self) -> Result<(), SignalError> {
        self.rx.await.map_err(|_| {
            debug!("completion signaller dropped without signalling");
            SignalError::Abandoned
        })
    }
}

/// Spawns `background`, then waits until it signals completion.
pub async fn run_with_completion_signal<B>(background: B) -> Result<(), SignalError>
where
    B: Future<Output = ()> + Send + 'static,
{
    run_alongside(background, async {}).await
}

/// Spawns `background`, runs `foreground` on the calling task meanwhile, then
/// waits for the background signal and returns the foreground's output.
///
/// # Example
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use std::time::Duration;
/// use fanvisor::run_alongside;
///
/// let out = run_alongside(
///     async { tokio::time::sleep(Duration::from_millis(10)).await },
///     async { 2 + 2 },
/// )
/// .await;
/// assert_eq!(out, Ok(4));
/// # }
/// ```
pub async fn run_alongside<B, F, T>(background: B, foreground: F) -> Result<T, SignalError>
where
    B: Future<Output = ()> + Send + 'static,
    F: Future<Output = T>,
{
    let (signaller, waiter) = pair();
    tokio::spawn(async move {
        background.await;
        signaller.signal_once();
    });

    let out = foreground.await;
    waiter.await_once().await?;
    Ok(out)
}
