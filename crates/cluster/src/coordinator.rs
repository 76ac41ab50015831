//! Coordinator: the single entry point for client traffic.
//!
//! Owns one ring and one replicator. A PUT picks the responsible replicas
//! off the ring and fans the write out; a GET does the same for reads,
//! dropping to a degraded read quorum once any node is known offline and
//! triggering read-repair behind a successful degraded read.
//!
//! Two states, no way back: **Healthy** (no offline nodes, quorums as
//! configured) and **Degraded** (every offline notification shrinks W and
//! R by one, floored at 1, for the life of the process).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use corelib::{HashRing, NodeId, RingBuilder};
use replication::{ReplicaStore, Replicator};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Coordinator state shared by all request handlers.
pub struct Coordinator<S> {
    ring: HashRing,
    replicator: Replicator<S>,
    replication_factor: usize,
    any_offline: AtomicBool,
}

impl<S: ReplicaStore> Coordinator<S> {
    /// Build a coordinator over `store`, seeding the ring with the
    /// initial node list.
    pub fn new(
        store: Arc<S>,
        nodes: impl IntoIterator<Item = NodeId>,
        replication_factor: usize,
        quorum_write: usize,
        quorum_read: usize,
    ) -> Self {
        Self {
            ring: RingBuilder::new().add_nodes(nodes).build(),
            replicator: Replicator::new(store, quorum_write, quorum_read),
            replication_factor,
            any_offline: AtomicBool::new(false),
        }
    }

    /// Write path: replicate `value` to the nodes responsible for `key`.
    pub async fn put(&self, key: &str, value: &Value) -> bool {
        let replicas = self.ring.get_nodes(key, self.replication_factor);
        self.replicator.replicate_write(key, value, &replicas).await
    }

    /// Read path: quorum read, degraded by one while any node is offline.
    ///
    /// A hit under a degraded quorum spawns read-repair in the background;
    /// the caller gets its answer immediately.
    pub async fn get(self: Arc<Self>, key: &str) -> Option<Value> {
        let replicas = self.ring.get_nodes(key, self.replication_factor);
        let degraded = self.is_degraded();
        let read_quorum = if degraded {
            self.replicator.read_quorum().saturating_sub(1).max(1)
        } else {
            self.replicator.read_quorum()
        };

        let value = self
            .replicator
            .get_from_replicas(key, &replicas, read_quorum)
            .await?;

        if degraded {
            let coordinator = Arc::clone(&self);
            let key = key.to_string();
            let repaired = value.clone();
            tokio::spawn(async move {
                coordinator
                    .replicator
                    .repair_missing(&key, &repaired, &replicas)
                    .await;
            });
        }
        Some(value)
    }

    /// Failure notification: hide the node from the ring and degrade the
    /// quorum thresholds. Permanent for the life of the process.
    pub fn mark_offline(&self, node: &NodeId) {
        if !self.ring.remove_node(node) {
            warn!(%node, "offline notification for a node the ring does not know");
        }
        self.any_offline.store(true, Ordering::Relaxed);
        self.replicator.degrade_quorum();
        info!(%node, "node marked offline");
    }

    pub fn is_degraded(&self) -> bool {
        self.any_offline.load(Ordering::Relaxed)
    }

    /// The replicas the ring currently holds responsible for `key`.
    pub fn replicas_for(&self, key: &str) -> Vec<NodeId> {
        self.ring.get_nodes(key, self.replication_factor)
    }

    pub fn write_quorum(&self) -> usize {
        self.replicator.write_quorum()
    }

    pub fn read_quorum(&self) -> usize {
        self.replicator.read_quorum()
    }
}

#[derive(Deserialize)]
struct PutRequest {
    value: Value,
}

#[derive(Deserialize)]
struct OfflineNotice {
    node: NodeId,
}

/// The coordinator's HTTP surface.
pub fn router<S: ReplicaStore>(coordinator: Arc<Coordinator<S>>) -> Router {
    Router::new()
        .route("/put/:key", put(put_key::<S>))
        .route("/get/:key", get(get_key::<S>))
        .route("/node_offline", post(node_offline::<S>))
        .with_state(coordinator)
}

async fn put_key<S: ReplicaStore>(
    State(coordinator): State<Arc<Coordinator<S>>>,
    Path(key): Path<String>,
    Json(request): Json<PutRequest>,
) -> impl IntoResponse {
    if coordinator.put(&key, &request.value).await {
        (StatusCode::OK, Json(json!({"status": "success"})))
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"status": "failure"})))
    }
}

async fn get_key<S: ReplicaStore>(
    State(coordinator): State<Arc<Coordinator<S>>>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    match coordinator.get(&key).await {
        Some(value) => (StatusCode::OK, Json(json!({"value": value}))),
        None => (StatusCode::NOT_FOUND, Json(json!({"value": null}))),
    }
}

async fn node_offline<S: ReplicaStore>(
    State(coordinator): State<Arc<Coordinator<S>>>,
    Json(notice): Json<OfflineNotice>,
) -> impl IntoResponse {
    coordinator.mark_offline(&notice.node);
    Json(json!({"status": "node removed"}))
}
