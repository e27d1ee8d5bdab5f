//! Protocol dispatch for the two intakes.

use std::sync::Arc;

use crate::intake::IntakeServer;
use crate::net::address::ListenAddr;
use crate::net::listener::{ListenerError, ListenerHandle};
use crate::net::pool::PacketPool;
use crate::net::tcp::start_statsd_tcp;
use crate::net::tls::SecurityMode;
use crate::net::udp::{start_udp_readers, PacketKind, ReaderPoolConfig};
use crate::net::unix::start_ssf_unix;

/// Start listening for statsd metrics on `addr` (UDP or TCP).
pub fn start_statsd(server: &IntakeServer, addr: &ListenAddr, pool: Arc<PacketPool>) -> Result<ListenerHandle, ListenerError> {
    let settings = server.settings();
    let handle = match addr {
        ListenAddr::Udp(udp) => {
            let config = ReaderPoolConfig::for_metrics(settings.num_readers, settings.recv_buffer_bytes);
            start_udp_readers(server, *udp, config, pool, PacketKind::Metric)?
        }
        ListenAddr::Tcp(tcp) => {
            let handle = start_statsd_tcp(server, *tcp)?;
            tracing::info!(
                address = %handle.local_addr(),
                network = addr.network(),
                mode = %SecurityMode::for_tls(server.tls()),
                "Listening for statsd metrics"
            );
            return Ok(handle);
        }
        ListenAddr::Unix(_) => {
            return Err(ListenerError::UnsupportedAddress {
                intake: "statsd metrics",
                addr: addr.clone(),
                supported: "udp:// and tcp://",
            })
        }
    };

    tracing::info!(
        address = %handle.local_addr(),
        network = addr.network(),
        "Listening for statsd metrics"
    );
    Ok(handle)
}

/// Start listening for SSF spans on `addr` (UDP or Unix).
pub fn start_ssf(server: &IntakeServer, addr: &ListenAddr, pool: Arc<PacketPool>) -> Result<ListenerHandle, ListenerError> {
    let settings = server.settings();
    let handle = match addr {
        ListenAddr::Udp(udp) => {
            let config = ReaderPoolConfig::for_traces(settings.num_readers, settings.recv_buffer_bytes);
            start_udp_readers(server, *udp, config, pool, PacketKind::Trace)?
        }
        ListenAddr::Unix(path) => start_ssf_unix(server, path)?,
        ListenAddr::Tcp(_) => {
            return Err(ListenerError::UnsupportedAddress {
                intake: "SSF",
                addr: addr.clone(),
                supported: "udp:// and unix://",
            })
        }
    };

    tracing::info!(
        address = %handle.local_addr(),
        network = addr.network(),
        "Listening for SSF traces"
    );
    Ok(handle)
}
