//! Telemetry intake listeners
//!
//! # Architecture Overview
//!
//! ```text
//!     statsd (udp/tcp)        SSF (udp/unix)
//!          │                       │
//!          ▼                       ▼
//!     ┌──────────────────────────────────┐
//!     │ intake::dispatch                 │
//!     │   net::udp  net::tcp  net::unix  │──▶ PacketHandler
//!     └──────────────┬───────────────────┘
//!                    │ supervised tasks
//!                    ▼
//!     ┌──────────────────────────────────┐
//!     │ lifecycle: shutdown, supervisor, │
//!     │            signals               │
//!     └──────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use intake_listeners::config::{load_config, IntakeConfig};
use intake_listeners::diagnostics::SoftnetReporter;
use intake_listeners::intake::{IntakeServer, LoggingHandler};
use intake_listeners::lifecycle::signals::wait_for_termination;
use intake_listeners::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "intake-listeners")]
#[command(about = "Telemetry intake listeners for statsd and SSF", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => IntakeConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), hostname = %config.hostname, "intake-listeners starting");

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
        tracing::info!(address = %addr, "Metrics endpoint listening");
    }

    let statsd = config.statsd_addrs()?;
    let ssf = config.ssf_addrs()?;

    let server = IntakeServer::from_config(&config, Arc::new(LoggingHandler))?;
    let handles = match server.start_listeners(&statsd, &ssf) {
        Ok(handles) => handles,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start listeners");
            return Err(e.into());
        }
    };
    tracing::info!(listeners = handles.len(), "All listeners started");

    if config.observability.softnet_interval_secs > 0 {
        let reporter = SoftnetReporter::new(Duration::from_secs(config.observability.softnet_interval_secs));
        tokio::spawn(reporter.run(server.shutdown_signal()));
    }

    wait_for_termination(server.shutdown_handle()).await;
    server.shutdown();

    let closing = wait_for_listeners(handles);
    match tokio::time::timeout(config.shutdown_timeout(), closing).await {
        Ok(()) => tracing::info!("Shutdown complete"),
        Err(_) => tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Listeners did not close before the shutdown timeout"
        ),
    }

    Ok(())
}

/// Wait for every listener to release its resources.
async fn wait_for_listeners(handles: Vec<intake_listeners::ListenerHandle>) {
    for handle in handles {
        handle.closed().await;
    }
}
