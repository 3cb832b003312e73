//! Cluster relay node.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request           ┌──────────────────────────────────────────────┐
//!     ─────────────────────────┼─▶ http server ─▶ forward middleware          │
//!                              │                   │            │             │
//!                              │          local routes    proxy::Forwarder    │
//!                              │                          │          │        │
//!                              │                    http relay   ws relay ────┼──▶ Peer node
//!                              │                                              │     (TLS)
//!                              │  config + watcher ─▶ MemberDirectory          │
//!                              │  observability (tracing, prometheus)         │
//!                              │  lifecycle (signals, shutdown)               │
//!                              └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use cluster_relay::cluster::MemberDirectory;
use cluster_relay::config::{load_config, watcher::ConfigWatcher, AgentConfig};
use cluster_relay::http::HttpServer;
use cluster_relay::lifecycle::{wait_for_signal, Shutdown};
use cluster_relay::observability::{logging, metrics};

const RELAY_DRAIN: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "cluster-relay")]
#[command(about = "Cluster agent node with peer request forwarding", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AgentConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), node = %config.node.name, "cluster-relay starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        members = config.members.len(),
        tls = config.listener.tls.is_some(),
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

    let directory = Arc::new(MemberDirectory::new(config.members.clone()));
    let shutdown = Shutdown::new();

    // Hot-reload the member list; everything else needs a restart.
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            let directory = Arc::clone(&directory);
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        update = updates.recv() => match update {
                            Some(next) => directory.replace(next.members),
                            None => break,
                        },
                        _ = stop.recv() => break,
                    }
                }
            });
            Some(watcher)
        }
        None => None,
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, directory)?;
    let relays = server.forwarder().relays().clone();
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal().await;
    tracing::info!("Shutdown requested, draining");
    shutdown.trigger();

    server_task.await??;

    // Upgraded connections outlive the HTTP server; give them a moment.
    if tokio::time::timeout(RELAY_DRAIN, relays.wait_idle()).await.is_err() {
        tracing::warn!(active = relays.active_count(), "Websocket relays still open at exit");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
