//! Single storage node.
//!
//! An in-memory key space behind the two-endpoint HTTP surface the
//! replicator consumes, plus a background task announcing the node to the
//! failure detector every few seconds. The coordinator treats this
//! process as a black box; anything with the same two endpoints could
//! stand in for it.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use corelib::NodeId;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, warn};

/// How often a storage node announces itself to the failure detector.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(5);

pub struct StorageNode {
    id: NodeId,
    data: DashMap<String, Value>,
}

impl StorageNode {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            data: DashMap::new(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn store(&self, key: String, value: Value) {
        self.data.insert(key, value);
    }

    pub fn retrieve(&self, key: &str) -> Option<Value> {
        self.data.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Deserialize)]
struct PutBody {
    key: String,
    value: Value,
}

#[derive(Deserialize)]
struct GetParams {
    key: String,
}

/// The storage node's HTTP surface.
pub fn router(node: Arc<StorageNode>) -> Router {
    Router::new()
        .route("/put", put(put_data))
        .route("/get", get(get_data))
        .with_state(node)
}

async fn put_data(
    State(node): State<Arc<StorageNode>>,
    Json(body): Json<PutBody>,
) -> Json<Value> {
    debug!(node = %node.id(), key = %body.key, "storing value");
    node.store(body.key, body.value);
    Json(json!({"status": "ok"}))
}

async fn get_data(
    State(node): State<Arc<StorageNode>>,
    Query(params): Query<GetParams>,
) -> impl IntoResponse {
    match node.retrieve(&params.key) {
        Some(value) => (
            StatusCode::OK,
            Json(json!({"key": params.key, "value": value})),
        ),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "Key not found"}))),
    }
}

/// Push one heartbeat per period to the failure detector until shutdown.
///
/// Send failures are logged and swallowed; a node that cannot reach the
/// detector keeps serving reads and writes.
pub async fn run_heartbeat_loop(
    node_id: NodeId,
    detector_address: String,
    mut shutdown: watch::Receiver<bool>,
) {
    let client = match reqwest::Client::builder().timeout(HEARTBEAT_PERIOD).build() {
        Ok(client) => client,
        Err(err) => {
            warn!(error = %err, "could not build heartbeat client; heartbeats disabled");
            return;
        }
    };
    let url = format!("http://{}/heartbeat", detector_address);
    let mut ticker = tokio::time::interval(HEARTBEAT_PERIOD);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let body = json!({"node": node_id, "timestamp": unix_now()});
                match client.post(&url).json(&body).send().await {
                    Ok(response) if response.status().is_success() => {
                        debug!(node = %node_id, "heartbeat sent");
                    }
                    Ok(response) => {
                        warn!(node = %node_id, status = %response.status(), "heartbeat rejected");
                    }
                    Err(err) => {
                        warn!(node = %node_id, error = %err, "failed to send heartbeat");
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_retrieve() {
        let node = StorageNode::new("a:8001".parse().unwrap());
        assert!(node.is_empty());
        assert_eq!(node.retrieve("k"), None);

        node.store("k".to_string(), json!({"name": "Alice"}));
        assert_eq!(node.retrieve("k"), Some(json!({"name": "Alice"})));
        assert_eq!(node.len(), 1);
    }

    #[test]
    fn test_store_overwrites() {
        let node = StorageNode::new("a:8001".parse().unwrap());
        node.store("k".to_string(), json!(1));
        node.store("k".to_string(), json!(2));
        assert_eq!(node.retrieve("k"), Some(json!(2)));
        assert_eq!(node.len(), 1);
    }
}
