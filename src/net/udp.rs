//! UDP reader pool.
//!
//! # Responsibilities
//! - Bind one socket per worker on a single logical address
//! - Let the kernel spread datagrams across workers (`SO_REUSEPORT`)
//! - Read into pooled buffers and hand packets to the handler
//!
//! # Design Decisions
//! - Every socket is bound before any worker starts: one failed bind fails
//!   the whole pool, nothing is left half-running
//! - Workers stop on the shutdown signal, which closes their sockets

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

use crate::intake::{IntakeServer, PacketHandler};
use crate::lifecycle::{ShutdownSignal, TaskError};
use crate::net::address::ListenAddr;
use crate::net::listener::{ListenerError, ListenerHandle};
use crate::net::pool::PacketPool;
use crate::net::socket::new_udp_socket;
use crate::observability::metrics;

/// Reader pool sizing. Immutable once the pool starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderPoolConfig {
    pub workers: usize,
    /// Requested `SO_RCVBUF`; zero keeps the kernel default.
    pub recv_buffer_bytes: usize,
    pub reuse_port: bool,
}

impl ReaderPoolConfig {
    /// Metrics intake: address sharing whenever there is more than one worker.
    pub fn for_metrics(workers: usize, recv_buffer_bytes: usize) -> Self {
        Self {
            workers,
            recv_buffer_bytes,
            reuse_port: workers > 1,
        }
    }

    /// Trace intake: a single reader, sharing the port when the service runs
    /// several readers elsewhere.
    pub fn for_traces(num_readers: usize, recv_buffer_bytes: usize) -> Self {
        Self {
            workers: 1,
            recv_buffer_bytes,
            reuse_port: num_readers > 1,
        }
    }
}

/// What a datagram carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// One or more newline-separated statsd lines.
    Metric,
    /// A single SSF span.
    Trace,
}

impl PacketKind {
    fn as_str(self) -> &'static str {
        match self {
            PacketKind::Metric => "metric",
            PacketKind::Trace => "trace",
        }
    }

    fn task_name(self) -> &'static str {
        match self {
            PacketKind::Metric => "statsd_udp_reader",
            PacketKind::Trace => "ssf_udp_reader",
        }
    }
}

/// Bind `config.workers` sockets on `addr` and start a reader on each.
pub fn start_udp_readers(
    server: &IntakeServer,
    addr: SocketAddr,
    config: ReaderPoolConfig,
    pool: Arc<PacketPool>,
    kind: PacketKind,
) -> Result<ListenerHandle, ListenerError> {
    if config.workers == 0 {
        return Err(ListenerError::NoWorkers(ListenAddr::Udp(addr)));
    }

    let mut bind_addr = addr;
    let mut sockets = Vec::with_capacity(config.workers);
    for _ in 0..config.workers {
        let bind_err = move |source| ListenerError::Bind {
            addr: ListenAddr::Udp(bind_addr),
            source,
        };
        let socket = new_udp_socket(bind_addr, config.recv_buffer_bytes, config.reuse_port).map_err(bind_err)?;
        // Port 0: the remaining workers join whatever port the kernel picked.
        if bind_addr.port() == 0 {
            bind_addr = socket.local_addr().map_err(bind_err)?;
        }
        sockets.push(socket);
    }

    let mut workers = Vec::with_capacity(sockets.len());
    for (worker, socket) in sockets.into_iter().enumerate() {
        let reader = UdpReader {
            socket,
            pool: Arc::clone(&pool),
            handler: server.handler(),
            kind,
            worker,
        };
        workers.push(server.supervisor().spawn(kind.task_name(), reader.run(server.shutdown_signal())));
    }

    tracing::debug!(
        address = %bind_addr,
        workers = config.workers,
        reuse_port = config.reuse_port,
        kind = kind.as_str(),
        "UDP reader pool started"
    );

    let (done_tx, done_rx) = oneshot::channel();
    tokio::spawn(async move {
        for worker in workers {
            let _ = worker.await;
        }
        let _ = done_tx.send(());
    });

    Ok(ListenerHandle::new(ListenAddr::Udp(bind_addr), done_rx))
}

struct UdpReader {
    socket: UdpSocket,
    pool: Arc<PacketPool>,
    handler: Arc<dyn PacketHandler>,
    kind: PacketKind,
    worker: usize,
}

impl UdpReader {
    async fn run(self, mut shutdown: ShutdownSignal) -> Result<(), TaskError> {
        // Buffers are one byte longer than the largest accepted packet, so a
        // full buffer means the datagram was truncated.
        let max_len = self.pool.buffer_len().saturating_sub(1);

        loop {
            let mut buf = self.pool.take();
            let received = tokio::select! {
                _ = shutdown.recv() => None,
                res = self.socket.recv_from(&mut buf) => Some(res),
            };
            let Some(received) = received else {
                self.pool.give(buf);
                break;
            };

            match received {
                Ok((n, peer)) if n > max_len => {
                    metrics::record_oversize_packet(self.kind.as_str());
                    tracing::warn!(peer = %peer, max_len, kind = self.kind.as_str(), "Dropping oversize packet");
                }
                Ok((n, _)) => self.deliver(&buf[..n]),
                Err(e) => tracing::error!(error = %e, worker = self.worker, "Error reading from UDP socket"),
            }
            self.pool.give(buf);
        }

        tracing::debug!(worker = self.worker, kind = self.kind.as_str(), "UDP reader stopped");
        Ok(())
    }

    fn deliver(&self, packet: &[u8]) {
        match self.kind {
            PacketKind::Metric => {
                for line in packet.split(|b| *b == b'\n').filter(|l| !l.is_empty()) {
                    self.handler.handle_metric_packet(line);
                }
            }
            PacketKind::Trace => self.handler.handle_trace_packet(packet),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_pool_reuses_port_only_with_several_workers() {
        for workers in 2..=16 {
            let config = ReaderPoolConfig::for_metrics(workers, 0);
            assert!(config.reuse_port, "workers = {workers}");
            assert_eq!(config.workers, workers);
        }
        assert!(!ReaderPoolConfig::for_metrics(1, 0).reuse_port);
    }

    #[test]
    fn trace_pool_is_single_worker_with_explicit_reuse() {
        let shared = ReaderPoolConfig::for_traces(4, 1024);
        assert_eq!(shared.workers, 1);
        assert!(shared.reuse_port);
        assert_eq!(shared.recv_buffer_bytes, 1024);

        assert!(!ReaderPoolConfig::for_traces(1, 0).reuse_port);
    }
}
