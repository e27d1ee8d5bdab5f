//! Statsd over TCP, optionally behind TLS.
//!
//! # Responsibilities
//! - Bind a single listener
//! - Accept connections until shutdown, then close the listener
//! - Run the TLS handshake (when configured) and the line reader per connection
//!
//! # Design Decisions
//! - Accept races the shutdown signal, so the listener is closed promptly
//!   rather than after the next connection
//! - Connections already accepted are left to finish on their own
//! - An accept error outside shutdown is fatal, as on the Unix listener

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;

use crate::intake::stream::read_statsd_lines;
use crate::intake::{IntakeServer, PacketHandler};
use crate::lifecycle::{ShutdownSignal, Supervisor, TaskError};
use crate::net::address::ListenAddr;
use crate::net::listener::{accept_failure, ListenerError, ListenerHandle};
use crate::net::socket::new_tcp_listener;
use crate::net::tls::SecurityMode;
use crate::observability::metrics;

/// Bind `addr` and start accepting statsd connections.
pub fn start_statsd_tcp(server: &IntakeServer, addr: SocketAddr) -> Result<ListenerHandle, ListenerError> {
    let bind_err = |source| ListenerError::Bind {
        addr: ListenAddr::Tcp(addr),
        source,
    };
    let listener = new_tcp_listener(addr, false).map_err(bind_err)?;
    let local_addr = listener.local_addr().map_err(bind_err)?;

    tracing::debug!(
        address = %local_addr,
        mode = %SecurityMode::for_tls(server.tls()),
        "TCP listener bound"
    );

    let accept_loop = TcpAcceptLoop {
        listener,
        acceptor: server.tls().map(|tls| tls.acceptor()),
        supervisor: server.supervisor().clone(),
        handler: server.handler(),
        max_line_len: server.settings().metric_max_length,
    };
    let task = server
        .supervisor()
        .spawn("statsd_tcp_accept", accept_loop.run(server.shutdown_signal()));

    let (done_tx, done_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = task.await;
        let _ = done_tx.send(());
    });

    Ok(ListenerHandle::new(ListenAddr::Tcp(local_addr), done_rx))
}

struct TcpAcceptLoop {
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    supervisor: Supervisor,
    handler: Arc<dyn PacketHandler>,
    max_line_len: usize,
}

impl TcpAcceptLoop {
    async fn run(self, mut shutdown: ShutdownSignal) -> Result<(), TaskError> {
        let local_addr = self.listener.local_addr().map_err(|e| TaskError::Fatal(e.to_string()))?;
        let addr = ListenAddr::Tcp(local_addr);

        let result = loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => break Ok(()),
                res = self.listener.accept() => res,
            };

            match accepted {
                Ok((stream, peer)) => {
                    metrics::record_connection("tcp");
                    tracing::debug!(peer = %peer, "TCP connection accepted");
                    self.supervisor.spawn(
                        "statsd_tcp_connection",
                        serve_connection(stream, peer, self.acceptor.clone(), Arc::clone(&self.handler), self.max_line_len),
                    );
                }
                Err(e) => break accept_failure(&addr, &shutdown, e),
            }
        };

        drop(self.listener);
        tracing::info!(address = %local_addr, "TCP listener closed");
        result
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: Option<TlsAcceptor>,
    handler: Arc<dyn PacketHandler>,
    max_line_len: usize,
) -> Result<(), TaskError> {
    let result = match acceptor {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls_stream) => read_statsd_lines(tls_stream, max_line_len, handler.as_ref()).await,
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "TLS handshake failed");
                return Ok(());
            }
        },
        None => read_statsd_lines(stream, max_line_len, handler.as_ref()).await,
    };

    match result {
        Ok(lines) => tracing::debug!(peer = %peer, lines, "TCP connection closed"),
        Err(e) => tracing::warn!(peer = %peer, error = %e, "Closing TCP connection"),
    }
    Ok(())
}
