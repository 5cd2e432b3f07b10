//! Prefix-mount reverse proxy binary.
//!
//! Loads a TOML route table, binds the listener, and serves until a
//! shutdown signal arrives.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use prefix_proxy::config::loader::load_config;
use prefix_proxy::config::ProxyConfig;
use prefix_proxy::lifecycle::Shutdown;
use prefix_proxy::observability;
use prefix_proxy::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "prefix-proxy", about = "Prefix-mount reverse proxy for development backends")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit without serving.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    if args.check {
        println!("configuration OK ({} routes)", config.routes.len());
        return Ok(());
    }

    observability::logging::init(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        cors = config.cors.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
