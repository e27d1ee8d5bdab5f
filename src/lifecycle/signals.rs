//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGTERM/SIGINT
//! - Also return when a supervised task escalated to shutdown

use crate::lifecycle::Shutdown;

/// Wait until the process is asked to stop, from outside or from within.
pub async fn wait_for_termination(shutdown: &Shutdown) {
    let mut internal = shutdown.subscribe();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
                    _ = internal.recv() => tracing::info!("Shutdown requested internally"),
                }
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
            _ = term.recv() => tracing::info!("Received SIGTERM"),
            _ = internal.recv() => tracing::info!("Shutdown requested internally"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl+C"),
            _ = internal.recv() => tracing::info!("Shutdown requested internally"),
        }
    }
}
