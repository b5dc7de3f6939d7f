//! # Termination signals for `serve_until_signal`.
//!
//! [`cancel_on_termination`] spawns a watcher that cancels the dispatcher's
//! shutdown token once the process is asked to stop. On Unix that is
//! `SIGINT`, `SIGTERM` or `SIGQUIT`; elsewhere only Ctrl-C is observed.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Spawns a task that cancels `token` on the first termination signal.
///
/// The caller aborts the returned handle once serving is over. If the handlers
/// cannot be installed the watcher logs and exits, leaving the token untouched.
pub(crate) fn cancel_on_termination(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match termination().await {
            Ok(signal) => {
                info!(signal, "termination signal received, shutting down");
                token.cancel();
            }
            Err(error) => warn!(%error, "failed to register OS signal handlers"),
        }
    })
}

/// Resolves to the name of the signal that arrived.
#[cfg(unix)]
async fn termination() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn termination() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
