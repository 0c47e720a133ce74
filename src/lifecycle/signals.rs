//! OS signal handling.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown

/// What the process should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Reload,
}

/// Wait for the next shutdown or reload signal.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<Signal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Interrupt received");
            Ok(Signal::Shutdown)
        }
        _ = terminate.recv() => {
            tracing::info!("SIGTERM received");
            Ok(Signal::Shutdown)
        }
        _ = hangup.recv() => {
            tracing::info!("SIGHUP received");
            Ok(Signal::Reload)
        }
    }
}

/// Wait for the next shutdown signal.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<Signal> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received");
    Ok(Signal::Shutdown)
}
