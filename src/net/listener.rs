//! Shared listener types.
//!
//! # Responsibilities
//! - Setup error type shared by every transport
//! - Handle returned by every started listener
//! - How stream listeners treat a failed accept

use std::io;
use std::path::PathBuf;
use tokio::sync::oneshot;

use crate::lifecycle::{ShutdownSignal, TaskError};
use crate::net::address::ListenAddr;
use crate::net::lock::LockError;

/// Error type for listener setup.
///
/// Every variant is fatal: the service must not run with a listener
/// missing. Messages carry the failing address or path.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The intake does not speak this transport.
    #[error("can't listen for {intake} on {addr}: only {supported} are supported")]
    UnsupportedAddress {
        intake: &'static str,
        addr: ListenAddr,
        supported: &'static str,
    },

    /// Failed to create or bind a socket.
    #[error("couldn't listen on {addr}: {source}")]
    Bind { addr: ListenAddr, source: io::Error },

    /// The socket path lock could not be taken.
    #[error("couldn't lock {addr}: {source}")]
    Lock { addr: ListenAddr, source: LockError },

    /// Failed to open up socket file permissions.
    #[error("couldn't set permissions on {}: {source}", path.display())]
    Permissions { path: PathBuf, source: io::Error },

    /// A reader pool was configured with zero workers.
    #[error("reader pool for {0} needs at least one worker")]
    NoWorkers(ListenAddr),
}

/// A started listener.
///
/// `closed` resolves once the listener has stopped and released every
/// resource it owned.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: ListenAddr,
    done: oneshot::Receiver<()>,
}

impl ListenerHandle {
    pub(crate) fn new(local_addr: ListenAddr, done: oneshot::Receiver<()>) -> Self {
        Self { local_addr, done }
    }

    /// The bound address, with any requested port 0 resolved.
    pub fn local_addr(&self) -> &ListenAddr {
        &self.local_addr
    }

    /// Wait for the listener to finish.
    pub async fn closed(self) {
        // A dropped sender also means the listener task is gone.
        let _ = self.done.await;
    }
}

/// Decide what a failed accept means for a stream listener.
///
/// While shutting down the error is expected and the accept loop ends
/// cleanly; otherwise the listener is broken and the failure is fatal.
pub(crate) fn accept_failure(addr: &ListenAddr, shutdown: &ShutdownSignal, error: io::Error) -> Result<(), TaskError> {
    if shutdown.is_triggered() {
        tracing::info!(address = %addr, error = %error, "Ignoring accept error while shutting down");
        Ok(())
    } else {
        Err(TaskError::Fatal(format!("accept failed on {}: {}", addr, error)))
    }
}
