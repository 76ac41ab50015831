//! Heartbeat-based failure detector.
//!
//! Tracks liveness for a known, static set of storage nodes. Nodes push
//! heartbeats over HTTP; a scan loop walks the table at a fixed cadence
//! and reports every node that has been silent past the threshold to the
//! coordinator, exactly once.
//!
//! Staleness is measured against the detector's own clock. The timestamp
//! a node puts in its heartbeat is informational only, so loose clock
//! sync between nodes and detector is tolerated.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use corelib::NodeId;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// A node silent for longer than this is reported offline (5x the
/// heartbeat period).
pub const FAILURE_THRESHOLD: Duration = Duration::from_secs(25);

/// Cadence of the heartbeat-table scan.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(1);

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(3);

pub struct FailureDetector {
    /// Last time each node was heard from, by this process's clock.
    /// Seeded at startup, entries are never removed.
    heartbeats: DashMap<NodeId, Instant>,
    /// Nodes already reported to the coordinator. Append-only.
    confirmed_failures: Mutex<HashSet<NodeId>>,
    coordinator_address: String,
    client: reqwest::Client,
    threshold: Duration,
}

impl FailureDetector {
    pub fn new(
        all_nodes: Vec<NodeId>,
        coordinator_address: String,
    ) -> Result<Self, reqwest::Error> {
        Self::with_threshold(all_nodes, coordinator_address, FAILURE_THRESHOLD)
    }

    pub fn with_threshold(
        all_nodes: Vec<NodeId>,
        coordinator_address: String,
        threshold: Duration,
    ) -> Result<Self, reqwest::Error> {
        let now = Instant::now();
        let heartbeats = DashMap::new();
        for node in all_nodes {
            heartbeats.insert(node, now);
        }
        let client = reqwest::Client::builder().timeout(NOTIFY_TIMEOUT).build()?;
        Ok(Self {
            heartbeats,
            confirmed_failures: Mutex::new(HashSet::new()),
            coordinator_address,
            client,
            threshold,
        })
    }

    /// Record a heartbeat from `node`.
    pub fn record_heartbeat(&self, node: NodeId, wire_timestamp: f64) {
        debug!(%node, wire_timestamp, "heartbeat received");
        self.heartbeats.insert(node, Instant::now());
    }

    /// Nodes silent past the threshold and not yet reported.
    pub fn stale_nodes(&self) -> Vec<NodeId> {
        let confirmed = self.confirmed_failures.lock();
        self.heartbeats
            .iter()
            .filter(|entry| entry.value().elapsed() > self.threshold)
            .filter(|entry| !confirmed.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// One detection pass: report every newly-stale node.
    pub async fn scan_once(&self) {
        for node in self.stale_nodes() {
            self.report_offline(&node).await;
        }
    }

    pub fn is_confirmed(&self, node: &NodeId) -> bool {
        self.confirmed_failures.lock().contains(node)
    }

    /// POST the failure to the coordinator. The node enters the confirmed
    /// set only on a 2xx reply, so an unreachable coordinator gets the
    /// report again on the next pass.
    async fn report_offline(&self, node: &NodeId) {
        let url = format!("http://{}/node_offline", self.coordinator_address);
        match self.client.post(&url).json(&json!({ "node": node })).send().await {
            Ok(response) if response.status().is_success() => {
                info!(%node, "coordinator notified of node failure");
                self.confirmed_failures.lock().insert(node.clone());
            }
            Ok(response) => {
                warn!(%node, status = %response.status(), "coordinator rejected failure report");
            }
            Err(err) => {
                warn!(%node, error = %err, "failed to notify coordinator");
            }
        }
    }
}

/// Run the detection loop until the shutdown signal fires.
pub async fn run_detection_loop(
    detector: Arc<FailureDetector>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(SCAN_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => detector.scan_once().await,
            _ = shutdown.changed() => {
                info!("detection loop stopping");
                break;
            }
        }
    }
}

#[derive(Deserialize)]
struct Heartbeat {
    node: NodeId,
    timestamp: f64,
}

/// The failure detector's HTTP surface.
pub fn router(detector: Arc<FailureDetector>) -> Router {
    Router::new()
        .route("/heartbeat", post(report_heartbeat))
        .with_state(detector)
}

async fn report_heartbeat(
    State(detector): State<Arc<FailureDetector>>,
    Json(heartbeat): Json<Heartbeat>,
) -> Json<Value> {
    detector.record_heartbeat(heartbeat.node, heartbeat.timestamp);
    Json(json!({"status": "ok"}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    fn detector(nodes: &[&str]) -> FailureDetector {
        FailureDetector::new(
            nodes.iter().map(|s| node(s)).collect(),
            "localhost:5000".to_string(),
        )
        .unwrap()
    }

    fn backdate(detector: &FailureDetector, id: &NodeId, age: Duration) {
        detector.heartbeats.insert(id.clone(), Instant::now() - age);
    }

    #[test]
    fn test_fresh_table_has_no_stale_nodes() {
        // Seeding with the startup time gives every node a full grace period.
        let detector = detector(&["a:8001", "b:8002"]);
        assert!(detector.stale_nodes().is_empty());
    }

    #[test]
    fn test_silent_node_becomes_stale() {
        let detector = detector(&["a:8001", "b:8002"]);
        backdate(&detector, &node("a:8001"), Duration::from_secs(30));

        assert_eq!(detector.stale_nodes(), vec![node("a:8001")]);
    }

    #[test]
    fn test_heartbeat_refreshes_node() {
        let detector = detector(&["a:8001"]);
        backdate(&detector, &node("a:8001"), Duration::from_secs(30));
        detector.record_heartbeat(node("a:8001"), 0.0);

        assert!(detector.stale_nodes().is_empty());
    }

    #[test]
    fn test_confirmed_failures_are_suppressed() {
        let detector = detector(&["a:8001", "b:8002"]);
        backdate(&detector, &node("a:8001"), Duration::from_secs(30));
        backdate(&detector, &node("b:8002"), Duration::from_secs(30));
        detector.confirmed_failures.lock().insert(node("a:8001"));

        assert_eq!(detector.stale_nodes(), vec![node("b:8002")]);
        assert!(detector.is_confirmed(&node("a:8001")));
    }

    #[test]
    fn test_late_heartbeat_does_not_unconfirm() {
        // Heartbeats after a report still update the table, but the node
        // stays in the confirmed set: no re-admission.
        let detector = detector(&["a:8001"]);
        detector.confirmed_failures.lock().insert(node("a:8001"));
        detector.record_heartbeat(node("a:8001"), 0.0);

        assert!(detector.is_confirmed(&node("a:8001")));
        assert!(detector.stale_nodes().is_empty());
    }
}
