//! OS termination signals for the executor actor.
//!
//! Unix: `SIGINT`, `SIGTERM`, `SIGQUIT`. Elsewhere: Ctrl-C.

use tracing::{info, warn};

/// Completes when the process receives a termination signal.
///
/// Never completes when `enabled` is false or when listeners cannot be
/// registered, so it can sit in a `select!` unconditionally.
pub(crate) async fn termination(enabled: bool) {
    if !enabled {
        return std::future::pending().await;
    }
    match listen().await {
        Ok(name) => info!(signal = name, "termination signal received"),
        Err(e) => {
            warn!(error = %e, "signal listeners unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(unix)]
async fn listen() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn listen() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
