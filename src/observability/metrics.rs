//! Metrics collection and exposition.
//!
//! # Metrics
//! - `intake_packets_total` (counter): packets handed to the handler, by kind
//! - `intake_oversize_packets_total` (counter): dropped oversize packets, by kind
//! - `intake_connections_total` (counter): accepted stream connections, by network
//! - `intake_task_failures_total` (counter): crashed background tasks, by task
//! - `softnet_*` (gauge): per-CPU softnet counters, by cpu

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::diagnostics::softnet::SoftnetData;

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_packet(kind: &'static str) {
    counter!("intake_packets_total", "kind" => kind).increment(1);
}

pub fn record_oversize_packet(kind: &'static str) {
    counter!("intake_oversize_packets_total", "kind" => kind).increment(1);
}

pub fn record_connection(network: &'static str) {
    counter!("intake_connections_total", "network" => network).increment(1);
}

pub fn record_task_failure(task: &'static str) {
    counter!("intake_task_failures_total", "task" => task).increment(1);
}

/// Publish one gauge set per processor.
pub fn record_softnet(data: &SoftnetData) {
    for (cpu, p) in data.processors.iter().enumerate() {
        let cpu = cpu.to_string();
        gauge!("softnet_processed", "cpu" => cpu.clone()).set(p.processed as f64);
        gauge!("softnet_dropped", "cpu" => cpu.clone()).set(p.dropped as f64);
        gauge!("softnet_time_squeeze", "cpu" => cpu.clone()).set(p.time_squeeze as f64);
        gauge!("softnet_cpu_collision", "cpu" => cpu.clone()).set(p.cpu_collision as f64);
        gauge!("softnet_received_rps", "cpu" => cpu.clone()).set(p.received_rps as f64);
        gauge!("softnet_flow_limit_count", "cpu" => cpu).set(p.flow_limit_count as f64);
    }
}
