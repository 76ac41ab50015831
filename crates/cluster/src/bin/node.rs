//! Storage node service entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cluster::shutdown::shutdown_signal;
use cluster::storage::{router, run_heartbeat_loop, StorageNode};
use corelib::NodeId;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser)]
#[command(name = "node")]
#[command(about = "Single storage node for the replicated key-value store")]
struct Args {
    /// This node's endpoint (host:port); also its identity in the cluster
    #[arg(long)]
    node: String,

    /// Failure detector endpoint to send heartbeats to (host:port)
    #[arg(long = "fault_tolerance_address")]
    fault_tolerance_address: String,
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
    let id: NodeId = args.node.parse().map_err(anyhow::Error::new)?;
    let node = Arc::new(StorageNode::new(id.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let heartbeats = tokio::spawn(run_heartbeat_loop(
        id.clone(),
        args.fault_tolerance_address,
        shutdown_rx,
    ));

    info!(node = %id, "starting storage node");
    let listener = tokio::net::TcpListener::bind(&args.node)
        .await
        .with_context(|| format!("failed to bind {}", args.node))?;
    axum::serve(listener, router(node))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    heartbeats.await?;

    info!(node = %id, "storage node stopped");
    Ok(())
}
