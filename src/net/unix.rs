//! Framed SSF over a Unix domain socket.
//!
//! # Data Flow
//! ```text
//! lock <path>.lock → remove stale <path> → bind → chmod 0666
//!
//! accept relay:  accept ──conn──▶ rendezvous channel ──▶ dispatch
//! dispatch:      select { conn → spawn frame reader, shutdown → close listener }
//! relay exit:    drop listener → release lock → fire completion
//! ```
//!
//! # Design Decisions
//! - The path lock is a cross-process flock: two services never race to
//!   bind the same socket path
//! - Accepting and shutdown handling live in separate tasks; the relay only
//!   produces connections, every shutdown decision is made by dispatch
//! - The lock and the completion signal are released by a drop guard, so
//!   they fire on every relay exit path, panics included

use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};

use crate::intake::stream::read_ssf_frames;
use crate::intake::{IntakeServer, PacketHandler};
use crate::lifecycle::{ShutdownSignal, Supervisor, TaskError};
use crate::net::address::ListenAddr;
use crate::net::listener::{accept_failure, ListenerError, ListenerHandle};
use crate::net::lock::{lock_path_for, FileLock};
use crate::observability::metrics;

/// Anyone who can reach the path may submit spans.
const SOCKET_MODE: u32 = 0o666;

/// Lock `path`, bind a Unix listener there and start serving SSF streams.
pub fn start_ssf_unix(server: &IntakeServer, path: &Path) -> Result<ListenerHandle, ListenerError> {
    let addr = ListenAddr::Unix(path.to_path_buf());
    let lock = FileLock::try_acquire(&lock_path_for(path)).map_err(|source| ListenerError::Lock {
        addr: addr.clone(),
        source,
    })?;

    // The lock is ours, so anything at the path is left over from a
    // previous instance.
    match fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "Removed stale socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not remove stale socket"),
    }

    let listener = UnixListener::bind(path).map_err(|source| ListenerError::Bind {
        addr: addr.clone(),
        source,
    })?;
    fs::set_permissions(path, Permissions::from_mode(SOCKET_MODE)).map_err(|source| ListenerError::Permissions {
        path: path.to_path_buf(),
        source,
    })?;

    let (conn_tx, conn_rx) = mpsc::channel(1);
    let (close_tx, close_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();

    let relay = AcceptRelay {
        listener,
        conns: conn_tx,
        close: close_rx,
        path: path.to_path_buf(),
        _release: ReleaseOnExit {
            lock: Some(lock),
            done: Some(done_tx),
        },
    };
    let dispatch = Dispatch {
        conns: conn_rx,
        close: close_tx,
        supervisor: server.supervisor().clone(),
        handler: server.handler(),
        max_frame_len: server.settings().trace_max_length,
    };

    server
        .supervisor()
        .spawn("ssf_unix_accept", relay.run(server.shutdown_signal()));
    server
        .supervisor()
        .spawn("ssf_unix_dispatch", dispatch.run(server.shutdown_signal()));

    Ok(ListenerHandle::new(addr, done_rx))
}

/// Releases the path lock, then fires completion. Runs when the relay ends.
struct ReleaseOnExit {
    lock: Option<FileLock>,
    done: Option<oneshot::Sender<()>>,
}

impl Drop for ReleaseOnExit {
    fn drop(&mut self) {
        drop(self.lock.take());
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

struct AcceptRelay {
    listener: UnixListener,
    conns: mpsc::Sender<UnixStream>,
    /// Fires (or is dropped) when dispatch closes the listener.
    close: oneshot::Receiver<()>,
    path: PathBuf,
    _release: ReleaseOnExit,
}

impl AcceptRelay {
    async fn run(self, shutdown: ShutdownSignal) -> Result<(), TaskError> {
        let AcceptRelay {
            listener,
            conns,
            mut close,
            path,
            _release: release,
        } = self;

        let result = loop {
            let accepted = tokio::select! {
                _ = &mut close => break Ok(()),
                res = listener.accept() => res,
            };

            match accepted {
                Ok((stream, _)) => {
                    if conns.send(stream).await.is_err() {
                        // Dispatch is gone, nobody will serve this connection.
                        break Ok(());
                    }
                }
                Err(e) => break accept_failure(&ListenAddr::Unix(path.clone()), &shutdown, e),
            }
        };

        drop(listener);
        tracing::info!(path = %path.display(), "Unix listener closed");
        drop(release);
        result
    }
}

struct Dispatch {
    conns: mpsc::Receiver<UnixStream>,
    close: oneshot::Sender<()>,
    supervisor: Supervisor,
    handler: Arc<dyn PacketHandler>,
    max_frame_len: usize,
}

impl Dispatch {
    async fn run(self, mut shutdown: ShutdownSignal) -> Result<(), TaskError> {
        let Dispatch {
            mut conns,
            close,
            supervisor,
            handler,
            max_frame_len,
        } = self;

        loop {
            tokio::select! {
                conn = conns.recv() => match conn {
                    Some(stream) => {
                        metrics::record_connection("unix");
                        supervisor.spawn(
                            "ssf_unix_connection",
                            serve_connection(stream, Arc::clone(&handler), max_frame_len),
                        );
                    }
                    // The relay stopped on its own.
                    None => return Ok(()),
                },
                _ = shutdown.recv() => {
                    let _ = close.send(());
                    return Ok(());
                }
            }
        }
    }
}

async fn serve_connection(stream: UnixStream, handler: Arc<dyn PacketHandler>, max_frame_len: usize) -> Result<(), TaskError> {
    match read_ssf_frames(stream, max_frame_len, handler.as_ref()).await {
        Ok(frames) => tracing::debug!(frames, "Unix connection closed"),
        Err(e) => tracing::warn!(error = %e, "Closing Unix connection"),
    }
    Ok(())
}
