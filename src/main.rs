//! Failover HTTP proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http server ─▶ routing ─▶ failover group
//!                    (request id,   (prefix,        │
//!                     trace,         host)          ▼
//!                     timeout)                  dispatcher ──▶ endpoint[cursor]
//!                                                   │      ──▶ endpoint[cursor+1] ...
//!     Client Response                               ▼
//!     ◀───────────── relay / ProxyError ◀──── first success or exhaustion
//!
//!     config file ─▶ watcher ─▶ server state swap (cursors kept)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use failover_proxy::config::loader::load_config;
use failover_proxy::config::watcher::ConfigWatcher;
use failover_proxy::config::FailoverConfig;
use failover_proxy::http::HttpServer;
use failover_proxy::lifecycle::{shutdown_signal, Shutdown};
use failover_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "failover-proxy")]
#[command(about = "HTTP proxy that fails over across ordered endpoints", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => FailoverConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "failover-proxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        groups = config.groups.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher handle must outlive the server.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_shutdown.trigger();
    });

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
