//! Failure detector service entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cluster::detector::{router, run_detection_loop, FailureDetector};
use cluster::shutdown::shutdown_signal;
use corelib::NodeId;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser)]
#[command(name = "fault_detector")]
#[command(about = "Heartbeat-based failure detector for the key-value store")]
struct Args {
    /// Listen address (host:port)
    #[arg(long)]
    address: String,

    /// Comma-separated endpoints of every storage node to watch
    #[arg(long = "all_nodes")]
    all_nodes: String,

    /// Coordinator endpoint to notify of failures (host:port)
    #[arg(long = "coordinator_address")]
    coordinator_address: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let nodes = args
        .all_nodes
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<NodeId>().map_err(anyhow::Error::new))
        .collect::<anyhow::Result<Vec<_>>>()?;
    anyhow::ensure!(!nodes.is_empty(), "--all_nodes must name at least one node");

    let detector = Arc::new(FailureDetector::new(nodes, args.coordinator_address)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scan = tokio::spawn(run_detection_loop(Arc::clone(&detector), shutdown_rx));

    info!(address = %args.address, "starting failure detector");
    let listener = tokio::net::TcpListener::bind(&args.address)
        .await
        .with_context(|| format!("failed to bind {}", args.address))?;
    axum::serve(listener, router(detector))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Serving is done; drain the scan loop before exiting.
    let _ = shutdown_tx.send(true);
    scan.await?;

    info!("failure detector stopped");
    Ok(())
}
