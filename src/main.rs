//! surge-breaker
//!
//! An HTTP front that detects clients holding a disproportionate share of
//! traffic during spikes and rejects them with 429 for a while.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace ─▶ timeout ─▶ circuit breaker ──┬──▶ handlers
//!                                                          │   ▲          │
//!                                                          │   │ 429      │ process(client)
//!                                                          │   │          ▼
//!                                                   is_blocked(client)  sketch + gates
//!                                                          │              │ offenders
//!                                                          ▼              ▼
//!                                                    block registry ◀── block worker
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use surge_breaker::config::{load_config, BreakerServiceConfig};
use surge_breaker::lifecycle::{wait_for_signal, Shutdown};
use surge_breaker::observability::{logging, metrics};
use surge_breaker::HttpServer;

#[derive(Parser)]
#[command(name = "surge-breaker", version, about = "Adaptive traffic-share circuit breaker")]
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
        None => BreakerServiceConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "surge-breaker starting");
    tracing::info!(
        config_path = ?args.config,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let server = HttpServer::new(config)?;
    server.run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
