use clap::{Parser, Subcommand};
use std::path::PathBuf;

use intake_listeners::config::load_config;
use intake_listeners::diagnostics::read_stats;

#[derive(Parser)]
#[command(name = "intake-cli")]
#[command(about = "Diagnostics CLI for the telemetry intake listeners", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print per-CPU packet processing stats from /proc/net/softnet_stat
    Softnet,
    /// Validate a config file and list the listeners it would start
    CheckConfig {
        /// Path to the TOML configuration file
        path: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Softnet => {
            let data = read_stats()?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Commands::CheckConfig { path } => {
            let config = load_config(&path)?;
            println!("Config OK: {}", path.display());
            for addr in config.statsd_addrs()? {
                println!("  statsd  {}", addr);
            }
            for addr in config.ssf_addrs()? {
                println!("  ssf     {}", addr);
            }
            if let Some(tls) = &config.tls {
                let mode = if tls.client_ca_path.is_some() { "authenticated" } else { "encrypted" };
                println!("  tls     {} ({})", tls.cert_path.display(), mode);
            }
        }
    }

    Ok(())
}
