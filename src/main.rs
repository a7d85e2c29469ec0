//! Forwarding proxy with pooled dispatch.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                 FORWARD PROXY                    │
//!                      │                                                  │
//!   Client ───────────▶│  net::Listener ──▶ server::proxy (classify)      │
//!                      │        │                 │                       │
//!                      │        │        CONNECT  │  other                │
//!                      │        │           ▼     ▼                       │
//!                      │        │   relay::tunnel relay::http ───────────▶│──▶ Origin
//!                      │        │                                         │
//!   Control ──────────▶│  server::control (axum)                          │
//!   (JSON API)         │        │ /connect          │ /send               │
//!                      │        ▼                   ▼                     │
//!                      │  pool::registry ──▶ dispatch::dispatcher ───────▶│──▶ Pooled
//!                      │  (host → pool)      (round robin, concurrent)    │    origins
//!                      │                                                  │
//!                      │  Cross-cutting: config, observability, lifecycle │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use forward_proxy::config::{load_config, ProxyConfig};
use forward_proxy::dispatch::ExchangeLimits;
use forward_proxy::observability::{logging, metrics};
use forward_proxy::pool::PoolRegistry;
use forward_proxy::server::{router, ControlState, ProxyServer};
use forward_proxy::Shutdown;

#[derive(Parser)]
#[command(name = "forward-proxy", about = "Forwarding proxy with pooled dispatch", long_about = None)]
struct Args {
    /// Path to a TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(
        proxy_address = %config.proxy.bind_address,
        control_address = %config.control.bind_address,
        max_connections = config.proxy.max_connections,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = Arc::new(PoolRegistry::new(Duration::from_secs(
        config.timeouts.connect_secs,
    )));
    let shutdown = Arc::new(Shutdown::new());

    // Control API
    let control_listener = TcpListener::bind(&config.control.bind_address).await?;
    tracing::info!(address = %control_listener.local_addr()?, "Control API listening");
    let control_router = router(
        ControlState::new(Arc::clone(&registry), ExchangeLimits::from_config(&config)),
        Duration::from_secs(config.timeouts.request_secs),
    );
    let mut control_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let served = axum::serve(control_listener, control_router)
            .with_graceful_shutdown(async move {
                let _ = control_shutdown.recv().await;
            })
            .await;
        if let Err(e) = served {
            tracing::error!(error = %e, "Control server failed");
        }
    });

    // Trigger shutdown on SIGINT/SIGTERM
    let signal_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        signal_shutdown.trigger_on_signal().await;
    });

    // Proxy server runs on the main task until shutdown
    let proxy = ProxyServer::bind(&config).await?;
    proxy.run(shutdown.subscribe()).await?;

    // Pools do not survive the process; tear them down explicitly.
    registry.close_everything().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
