//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::intake::IntakeSettings;
use crate::net::address::{AddressError, ListenAddr};

/// Root configuration for the intake service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Name attached to crash reports.
    pub hostname: String,

    /// How long to wait for listeners to close after shutdown.
    pub shutdown_timeout_secs: u64,

    /// Listen addresses and reader sizing.
    pub listeners: ListenersConfig,

    /// Optional TLS for statsd over TCP.
    pub tls: Option<TlsConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            shutdown_timeout_secs: 10,
            listeners: ListenersConfig::default(),
            tls: None,
            observability: ObservabilityConfig::default(),
        }
    }
}

impl IntakeConfig {
    /// Reader settings handed to the server.
    pub fn settings(&self) -> IntakeSettings {
        IntakeSettings {
            num_readers: self.listeners.num_readers,
            recv_buffer_bytes: self.listeners.recv_buffer_bytes,
            metric_max_length: self.listeners.metric_max_length,
            trace_max_length: self.listeners.trace_max_length,
            hostname: self.hostname.clone(),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn statsd_addrs(&self) -> Result<Vec<ListenAddr>, AddressError> {
        self.listeners.statsd_addresses.iter().map(|a| ListenAddr::parse(a)).collect()
    }

    pub fn ssf_addrs(&self) -> Result<Vec<ListenAddr>, AddressError> {
        self.listeners.ssf_addresses.iter().map(|a| ListenAddr::parse(a)).collect()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenersConfig {
    /// Statsd addresses (`udp://` or `tcp://`).
    pub statsd_addresses: Vec<String>,

    /// SSF addresses (`udp://` or `unix://`).
    pub ssf_addresses: Vec<String>,

    /// UDP metric readers per address.
    pub num_readers: usize,

    /// Requested socket receive buffer; 0 keeps the kernel default.
    pub recv_buffer_bytes: usize,

    /// Largest accepted statsd packet or line.
    pub metric_max_length: usize,

    /// Largest accepted SSF packet or frame.
    pub trace_max_length: usize,
}

impl Default for ListenersConfig {
    fn default() -> Self {
        Self {
            statsd_addresses: vec!["udp://127.0.0.1:8126".to_string()],
            ssf_addresses: Vec::new(),
            num_readers: 1,
            recv_buffer_bytes: 2 * 1024 * 1024,
            metric_max_length: 4096,
            trace_max_length: 16 * 1024,
        }
    }
}

/// TLS configuration for TCP listeners.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate chain (PEM).
    pub cert_path: PathBuf,

    /// Path to private key (PEM).
    pub key_path: PathBuf,

    /// CA bundle (PEM) used to verify client certificates. When set, every
    /// client must present one.
    #[serde(default)]
    pub client_ca_path: Option<PathBuf>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Seconds between softnet samples; 0 disables sampling.
    pub softnet_interval_secs: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            softnet_interval_secs: 0,
        }
    }
}
