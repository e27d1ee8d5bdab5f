//! Shared utilities for listener integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use intake_listeners::intake::{IntakeServer, IntakeSettings, PacketHandler};

/// How long a test waits for something that should happen promptly.
pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Metric(Vec<u8>),
    Trace(Vec<u8>),
}

/// Forwards every packet to the test over a channel.
pub struct RecordingHandler {
    tx: mpsc::UnboundedSender<Packet>,
}

impl PacketHandler for RecordingHandler {
    fn handle_metric_packet(&self, packet: &[u8]) {
        let _ = self.tx.send(Packet::Metric(packet.to_vec()));
    }

    fn handle_trace_packet(&self, packet: &[u8]) {
        let _ = self.tx.send(Packet::Trace(packet.to_vec()));
    }
}

/// Receiving side of a [`RecordingHandler`].
pub struct Received {
    rx: Mutex<mpsc::UnboundedReceiver<Packet>>,
}

impl Received {
    /// Next packet, failing the test if none arrives in time.
    pub async fn next(&self) -> Packet {
        tokio::time::timeout(WAIT, self.rx.lock().await.recv())
            .await
            .expect("timed out waiting for a packet")
            .expect("handler dropped")
    }

    /// Collect exactly `n` packets.
    pub async fn take(&self, n: usize) -> Vec<Packet> {
        let mut packets = Vec::with_capacity(n);
        for _ in 0..n {
            packets.push(self.next().await);
        }
        packets
    }

    /// Assert nothing else arrives within a short window.
    pub async fn assert_quiet(&self) {
        let extra = tokio::time::timeout(Duration::from_millis(200), self.rx.lock().await.recv()).await;
        assert!(extra.is_err(), "unexpected packet: {:?}", extra);
    }
}

pub fn recording_handler() -> (Arc<RecordingHandler>, Received) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(RecordingHandler { tx }), Received { rx: Mutex::new(rx) })
}

pub fn test_settings() -> IntakeSettings {
    IntakeSettings {
        num_readers: 1,
        recv_buffer_bytes: 0,
        metric_max_length: 512,
        trace_max_length: 4096,
        hostname: "test-host".to_string(),
    }
}

/// A server with a recording handler.
pub fn test_server(settings: IntakeSettings) -> (IntakeServer, Received) {
    let (handler, received) = recording_handler();
    (IntakeServer::new(settings, handler), received)
}

/// Encode one SSF stream frame.
pub fn ssf_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 5);
    frame.push(0);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}
