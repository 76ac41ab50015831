//! Coordinator service entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cluster::coordinator::{router, Coordinator};
use cluster::shutdown::shutdown_signal;
use corelib::NodeId;
use replication::HttpStore;
use tracing::info;

#[derive(Parser)]
#[command(name = "coordinator")]
#[command(about = "Quorum coordinator for the replicated key-value store")]
struct Args {
    /// Listen address (host:port)
    #[arg(long)]
    address: String,

    /// Comma-separated storage node endpoints ("h1:p1,h2:p2,...")
    #[arg(long)]
    nodes: String,

    /// Number of replicas per key
    #[arg(long = "replication_factor", default_value_t = 3)]
    replication_factor: usize,

    /// Write quorum
    #[arg(long = "quorum_write", default_value_t = 2)]
    quorum_write: usize,

    /// Read quorum
    #[arg(long = "quorum_read", default_value_t = 2)]
    quorum_read: usize,
}

fn parse_nodes(raw: &str) -> anyhow::Result<Vec<NodeId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<NodeId>().map_err(anyhow::Error::new))
        .collect()
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
    let nodes = parse_nodes(&args.nodes)?;
    anyhow::ensure!(!nodes.is_empty(), "--nodes must name at least one storage node");
    anyhow::ensure!(
        (1..=args.replication_factor).contains(&args.quorum_write),
        "--quorum_write must be in 1..=replication_factor"
    );
    anyhow::ensure!(
        (1..=args.replication_factor).contains(&args.quorum_read),
        "--quorum_read must be in 1..=replication_factor"
    );

    let store = Arc::new(HttpStore::new()?);
    let coordinator = Arc::new(Coordinator::new(
        store,
        nodes.clone(),
        args.replication_factor,
        args.quorum_write,
        args.quorum_read,
    ));

    info!(
        address = %args.address,
        nodes = nodes.len(),
        n = args.replication_factor,
        w = args.quorum_write,
        r = args.quorum_read,
        "starting coordinator"
    );

    let listener = tokio::net::TcpListener::bind(&args.address)
        .await
        .with_context(|| format!("failed to bind {}", args.address))?;
    axum::serve(listener, router(coordinator))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("coordinator stopped");
    Ok(())
}
