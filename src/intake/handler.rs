//! Packet consumer interface.
//!
//! Listeners only move bytes; decoding statsd lines or SSF spans is the
//! handler's business.

use crate::observability::metrics;

/// Receives every packet the listeners read.
pub trait PacketHandler: Send + Sync + 'static {
    /// One statsd line (no trailing newline).
    fn handle_metric_packet(&self, packet: &[u8]);

    /// One SSF span payload (datagram or stream frame).
    fn handle_trace_packet(&self, packet: &[u8]);
}

/// Counts packets and logs them at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl PacketHandler for LoggingHandler {
    fn handle_metric_packet(&self, packet: &[u8]) {
        metrics::record_packet("metric");
        tracing::trace!(packet = %String::from_utf8_lossy(packet), "Metric packet");
    }

    fn handle_trace_packet(&self, packet: &[u8]) {
        metrics::record_packet("trace");
        tracing::trace!(len = packet.len(), "Trace packet");
    }
}
