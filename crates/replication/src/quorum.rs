//! Quorum fan-out engine.
//!
//! Fans a write or read out to every responsible replica in parallel and
//! resolves as soon as the quorum is settled, one way or the other:
//!
//! - every target gets its own task, outcomes flow into an mpsc channel
//! - the collector exits at quorum, or as soon as the outstanding requests
//!   can no longer reach it (fail-fast)
//! - tasks still in flight detach; their results are discarded
//!
//! No value reconciliation happens here. Among the responses that satisfy
//! a read quorum, the first one received is returned; with intersecting
//! quorums (W + R > N) and no concurrent writers the responses are equal.

use std::sync::Arc;

use corelib::NodeId;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::store::ReplicaStore;

/// Write and read quorum thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumConfig {
    pub write: usize,
    pub read: usize,
}

/// Quorum-driven replication over a replica store.
///
/// The thresholds are set at construction and only ever shrink, via
/// `degrade_quorum` when the coordinator learns of an offline node.
pub struct Replicator<S> {
    store: Arc<S>,
    quorum: Mutex<QuorumConfig>,
}

impl<S: ReplicaStore> Replicator<S> {
    pub fn new(store: Arc<S>, write: usize, read: usize) -> Self {
        Self {
            store,
            quorum: Mutex::new(QuorumConfig { write, read }),
        }
    }

    pub fn write_quorum(&self) -> usize {
        self.quorum.lock().write
    }

    pub fn read_quorum(&self) -> usize {
        self.quorum.lock().read
    }

    /// Shrink both thresholds by one, never below 1.
    ///
    /// Called once per offline notification; the reduction is permanent
    /// and cumulative for the life of the process.
    pub fn degrade_quorum(&self) {
        let mut quorum = self.quorum.lock();
        quorum.write = quorum.write.saturating_sub(1).max(1);
        quorum.read = quorum.read.saturating_sub(1).max(1);
        info!(
            write = quorum.write,
            read = quorum.read,
            "degraded quorum thresholds"
        );
    }

    /// Replicate a write to every node in `nodes`, in parallel.
    ///
    /// Returns `true` as soon as the write quorum has acknowledged, and
    /// `false` as soon as the remaining in-flight requests cannot bring
    /// the count up to the quorum.
    pub async fn replicate_write(&self, key: &str, value: &Value, nodes: &[NodeId]) -> bool {
        let write_quorum = self.write_quorum();
        let total = nodes.len();
        let (tx, mut rx) = mpsc::channel(total.max(1));

        for node in nodes {
            let store = Arc::clone(&self.store);
            let node = node.clone();
            let key = key.to_string();
            let value = value.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let acked = match store.write(&node, &key, &value).await {
                    Ok(()) => {
                        debug!(%node, key = %key, "wrote to replica");
                        true
                    }
                    Err(err) => {
                        warn!(%node, key = %key, error = %err, "write to replica failed");
                        false
                    }
                };
                let _ = tx.send(acked).await;
            });
        }
        drop(tx);

        let mut acked = 0;
        let mut completed = 0;
        while let Some(ok) = rx.recv().await {
            completed += 1;
            if ok {
                acked += 1;
            }
            if acked >= write_quorum {
                debug!(key, acked, write_quorum, "write quorum reached");
                return true;
            }
            if acked + (total - completed) < write_quorum {
                break;
            }
        }
        warn!(key, acked, write_quorum, "write quorum missed");
        false
    }

    /// Read from every node in `nodes` in parallel and return the first
    /// value received once `read_quorum` replicas have answered with one.
    ///
    /// The threshold is a parameter rather than the stored config because
    /// the caller may be reading under a degraded quorum. `None` covers
    /// both not-found and quorum-miss; the two are indistinguishable here.
    pub async fn get_from_replicas(
        &self,
        key: &str,
        nodes: &[NodeId],
        read_quorum: usize,
    ) -> Option<Value> {
        let needed = read_quorum.max(1);
        let total = nodes.len();
        let (tx, mut rx) = mpsc::channel(total.max(1));

        for node in nodes {
            let store = Arc::clone(&self.store);
            let node = node.clone();
            let key = key.to_string();
            let tx = tx.clone();
            tokio::spawn(async move {
                let found = match store.read(&node, &key).await {
                    Ok(Some(value)) => {
                        debug!(%node, key = %key, "replica returned a value");
                        Some(value)
                    }
                    Ok(None) => {
                        debug!(%node, key = %key, "replica does not have the key");
                        None
                    }
                    Err(err) => {
                        warn!(%node, key = %key, error = %err, "read from replica failed");
                        None
                    }
                };
                let _ = tx.send(found).await;
            });
        }
        drop(tx);

        let mut values = Vec::new();
        let mut completed = 0;
        while let Some(found) = rx.recv().await {
            completed += 1;
            if let Some(value) = found {
                values.push(value);
            }
            if values.len() >= needed {
                debug!(key, responses = values.len(), "read quorum reached");
                return values.into_iter().next();
            }
            if values.len() + (total - completed) < needed {
                break;
            }
        }
        debug!(key, responses = values.len(), needed, "read quorum missed");
        None
    }

    /// Single-replica probe: does `node` hold a value for `key`?
    ///
    /// Any transport failure counts as absent.
    pub async fn has_value(&self, node: &NodeId, key: &str) -> bool {
        matches!(self.store.read(node, key).await, Ok(Some(_)))
    }

    /// Best-effort read-repair: write `value` to every replica in `nodes`
    /// that does not hold it.
    ///
    /// Failures are logged and swallowed; they never affect the read that
    /// triggered the repair.
    pub async fn repair_missing(&self, key: &str, value: &Value, nodes: &[NodeId]) {
        for node in nodes {
            if self.has_value(node, key).await {
                continue;
            }
            info!(%node, key, "read-repair: propagating value to lagging replica");
            if !self.replicate_write(key, value, std::slice::from_ref(node)).await {
                warn!(%node, key, "read-repair write did not reach quorum");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use serde_json::json;

    fn node(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    fn cluster() -> Vec<NodeId> {
        vec![node("a:8001"), node("b:8002"), node("c:8003")]
    }

    #[tokio::test]
    async fn test_write_reaches_quorum() {
        let store = Arc::new(MemStore::new());
        let replicator = Replicator::new(Arc::clone(&store), 3, 2);
        let nodes = cluster();

        assert!(replicator.replicate_write("k", &json!("v"), &nodes).await);
        // W equals the replica count, so every node acked before we returned.
        for n in &nodes {
            assert_eq!(store.value(n, "k"), Some(json!("v")));
        }
    }

    #[tokio::test]
    async fn test_write_quorum_miss_with_two_nodes_down() {
        let store = Arc::new(MemStore::new());
        let replicator = Replicator::new(Arc::clone(&store), 2, 2);
        let nodes = cluster();
        store.set_down(&nodes[0]);
        store.set_down(&nodes[1]);

        assert!(!replicator.replicate_write("k", &json!("v"), &nodes).await);
        // The partial write on the surviving node is allowed to persist.
        assert_eq!(store.value(&nodes[2], "k"), Some(json!("v")));
    }

    #[tokio::test]
    async fn test_write_with_no_replicas_fails() {
        let store = Arc::new(MemStore::new());
        let replicator = Replicator::new(store, 1, 1);
        assert!(!replicator.replicate_write("k", &json!("v"), &[]).await);
    }

    #[tokio::test]
    async fn test_read_reaches_quorum() {
        let store = Arc::new(MemStore::new());
        let replicator = Replicator::new(Arc::clone(&store), 2, 2);
        let nodes = cluster();
        for n in &nodes {
            store.seed(n, "k", json!({"name": "Alice"}));
        }

        let value = replicator.get_from_replicas("k", &nodes, 2).await;
        assert_eq!(value, Some(json!({"name": "Alice"})));
    }

    #[tokio::test]
    async fn test_read_quorum_miss_when_only_one_replica_has_value() {
        let store = Arc::new(MemStore::new());
        let replicator = Replicator::new(Arc::clone(&store), 2, 2);
        let nodes = cluster();
        store.seed(&nodes[0], "k", json!("v"));

        assert_eq!(replicator.get_from_replicas("k", &nodes, 2).await, None);
        // The same state satisfies a degraded quorum of one.
        assert_eq!(
            replicator.get_from_replicas("k", &nodes, 1).await,
            Some(json!("v"))
        );
    }

    #[tokio::test]
    async fn test_read_unknown_key_is_none() {
        let store = Arc::new(MemStore::new());
        let replicator = Replicator::new(store, 2, 2);
        assert_eq!(replicator.get_from_replicas("nope", &cluster(), 2).await, None);
    }

    #[tokio::test]
    async fn test_has_value_probe() {
        let store = Arc::new(MemStore::new());
        let replicator = Replicator::new(Arc::clone(&store), 1, 1);
        let nodes = cluster();
        store.seed(&nodes[0], "k", json!("v"));
        store.set_down(&nodes[2]);

        assert!(replicator.has_value(&nodes[0], "k").await);
        assert!(!replicator.has_value(&nodes[1], "k").await);
        // A dead replica counts as absent, not as an error.
        assert!(!replicator.has_value(&nodes[2], "k").await);
    }

    #[tokio::test]
    async fn test_repair_missing_fills_lagging_replicas() {
        let store = Arc::new(MemStore::new());
        let replicator = Replicator::new(Arc::clone(&store), 1, 1);
        let nodes = cluster();
        store.seed(&nodes[0], "k", json!("v"));

        replicator.repair_missing("k", &json!("v"), &nodes).await;

        for n in &nodes {
            assert_eq!(store.value(n, "k"), Some(json!("v")));
        }
    }

    #[tokio::test]
    async fn test_repair_failure_is_swallowed() {
        let store = Arc::new(MemStore::new());
        let replicator = Replicator::new(Arc::clone(&store), 1, 1);
        let nodes = cluster();
        store.seed(&nodes[0], "k", json!("v"));
        store.set_down(&nodes[1]);

        // Must not panic or error; the reachable replica still gets the value.
        replicator.repair_missing("k", &json!("v"), &nodes).await;
        assert_eq!(store.value(&nodes[2], "k"), Some(json!("v")));
        assert_eq!(store.value(&nodes[1], "k"), None);
    }

    #[tokio::test]
    async fn test_degrade_quorum_floors_at_one() {
        let store = Arc::new(MemStore::new());
        let replicator = Replicator::new(store, 2, 2);

        replicator.degrade_quorum();
        assert_eq!(replicator.write_quorum(), 1);
        assert_eq!(replicator.read_quorum(), 1);

        replicator.degrade_quorum();
        replicator.degrade_quorum();
        assert_eq!(replicator.write_quorum(), 1);
        assert_eq!(replicator.read_quorum(), 1);
    }
}
