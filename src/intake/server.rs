//! Intake server context.
//!
//! # Responsibilities
//! - Own what every listener shares: settings, shutdown, supervisor,
//!   packet handler and TLS
//! - Bring up every configured address, all or nothing
//! - Trigger shutdown

use std::sync::Arc;
use thiserror::Error;

use crate::config::IntakeConfig;
use crate::intake::dispatch::{start_ssf, start_statsd};
use crate::intake::PacketHandler;
use crate::lifecycle::{CrashReporter, LogCrashReporter, Shutdown, ShutdownSignal, Supervisor};
use crate::net::address::ListenAddr;
use crate::net::listener::{ListenerError, ListenerHandle};
use crate::net::pool::PacketPool;
use crate::net::tls::{TlsError, TlsSettings};

/// Errors building a server from configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Reader settings shared by every listener.
#[derive(Debug, Clone)]
pub struct IntakeSettings {
    /// UDP metric workers per address.
    pub num_readers: usize,
    /// Requested `SO_RCVBUF` for UDP sockets; zero keeps the kernel default.
    pub recv_buffer_bytes: usize,
    pub metric_max_length: usize,
    pub trace_max_length: usize,
    pub hostname: String,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            num_readers: 1,
            recv_buffer_bytes: 2 * 1024 * 1024,
            metric_max_length: 4096,
            trace_max_length: 16 * 1024,
            hostname: "localhost".to_string(),
        }
    }
}

/// Everything the listeners share.
pub struct IntakeServer {
    settings: IntakeSettings,
    shutdown: Shutdown,
    supervisor: Supervisor,
    handler: Arc<dyn PacketHandler>,
    tls: Option<TlsSettings>,
}

impl IntakeServer {
    /// Create a server reporting crashes to the log. Must be called inside a
    /// tokio runtime.
    pub fn new(settings: IntakeSettings, handler: Arc<dyn PacketHandler>) -> Self {
        Self::with_crash_reporter(settings, handler, Arc::new(LogCrashReporter))
    }

    pub fn with_crash_reporter(
        settings: IntakeSettings,
        handler: Arc<dyn PacketHandler>,
        reporter: Arc<dyn CrashReporter>,
    ) -> Self {
        let shutdown = Shutdown::new();
        let supervisor = Supervisor::start(settings.hostname.clone(), reporter, shutdown.clone());
        Self {
            settings,
            shutdown,
            supervisor,
            handler,
            tls: None,
        }
    }

    /// Build a server from loaded configuration, including TLS material.
    pub fn from_config(config: &IntakeConfig, handler: Arc<dyn PacketHandler>) -> Result<Self, ServerError> {
        let server = Self::new(config.settings(), handler);
        match &config.tls {
            Some(tls) => {
                let settings = TlsSettings::from_files(&tls.cert_path, &tls.key_path, tls.client_ca_path.as_deref())?;
                Ok(server.with_tls(settings))
            }
            None => Ok(server),
        }
    }

    /// Serve statsd over TLS on TCP listeners.
    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Start every statsd and SSF address.
    ///
    /// On the first failure the shutdown signal fires, so listeners that did
    /// start release their sockets, and the error is returned.
    pub fn start_listeners(&self, statsd: &[ListenAddr], ssf: &[ListenAddr]) -> Result<Vec<ListenerHandle>, ListenerError> {
        let metric_pool = Arc::new(PacketPool::new(self.settings.metric_max_length + 1));
        let trace_pool = Arc::new(PacketPool::new(self.settings.trace_max_length + 1));

        let started = statsd
            .iter()
            .map(|addr| start_statsd(self, addr, Arc::clone(&metric_pool)))
            .chain(ssf.iter().map(|addr| start_ssf(self, addr, Arc::clone(&trace_pool))))
            .collect::<Result<Vec<_>, _>>();

        if started.is_err() {
            self.shutdown.trigger();
        }
        started
    }

    /// Stop every listener.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub fn settings(&self) -> &IntakeSettings {
        &self.settings
    }

    pub fn shutdown_handle(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.subscribe()
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn handler(&self) -> Arc<dyn PacketHandler> {
        Arc::clone(&self.handler)
    }

    pub fn tls(&self) -> Option<&TlsSettings> {
        self.tls.as_ref()
    }
}
