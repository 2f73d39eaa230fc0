//! BlitzDB - A Minimal Networked Key-Value Store
//!
//! This is the main entry point for the BlitzDB server.
//! It parses the command line, sets up logging, and runs the listener
//! until Ctrl+C.

use anyhow::Context;
use blitzdb::{Server, ServerConfig};
use clap::Parser;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// BlitzDB - A minimal networked key-value store
#[derive(Parser, Debug)]
#[command(name = "blitzdb", version, about, long_about = None)]
struct Cli {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = blitzdb::DEFAULT_HOST)]
    host: String,

    /// Port to listen on (0 for an ephemeral port)
    #[arg(short, long, default_value_t = blitzdb::DEFAULT_PORT)]
    port: u16,

    /// Password clients must send with AUTH before FLUSHDB
    #[arg(long, env = "BLITZDB_PASSWORD", hide_env_values = true)]
    requirepass: Option<String>,

    /// Longest accepted request line, in bytes
    #[arg(long, default_value_t = blitzdb::protocol::DEFAULT_MAX_LINE_LENGTH)]
    max_line_length: usize,

    /// Periodically remove keys whose expiry time has passed
    #[arg(long)]
    active_expiry: bool,

    /// Sweep interval for --active-expiry, in milliseconds
    #[arg(long, default_value_t = 100)]
    expiry_interval_ms: u64,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            password: self.requirepass,
            max_line_length: self.max_line_length,
            active_expiry: self.active_expiry,
            expiry_interval: Duration::from_millis(self.expiry_interval_ms),
        }
    }
}

fn print_banner(addr: &std::net::SocketAddr, config: &ServerConfig) {
    println!(
        r#"
BlitzDB v{} - Minimal Networked Key-Value Store
──────────────────────────────────────────────────────────────
Server started on {}
AUTH: {}
Active expiry: {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        blitzdb::VERSION,
        addr,
        if config.password.is_some() { "required for FLUSHDB" } else { "disabled" },
        if config.active_expiry { "on" } else { "off" },
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = cli.into_config();
    let server = Server::bind(config.clone())
        .await
        .with_context(|| format!("failed to start server on {}", config.bind_address()))?;

    print_banner(&server.local_addr(), &config);

    // Set up graceful shutdown
    let handle = server.handle();
    let stats = handle.stats();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                return;
            }
        }
        handle.stop();
    });

    server.run().await;

    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}
