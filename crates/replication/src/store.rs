//! Replica store transport.
//!
//! The replicator is transport-agnostic: a replica is anything that can
//! accept a write and answer a read. `HttpStore` is the production
//! implementation speaking to the storage nodes' HTTP endpoints;
//! `MemStore` is an in-process backend for tests and local experiments.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use corelib::NodeId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// Per-replica request timeout. A request that exceeds it counts as a
/// failed response for quorum accounting.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// One replica's view of the key space.
///
/// A transport failure is an `Err`; a replica that answers "no such key"
/// is `Ok(None)`. The replicator treats the two differently only in
/// logging, both count as a non-response toward quorum.
#[async_trait]
pub trait ReplicaStore: Send + Sync + 'static {
    /// Store `value` under `key` on `node`.
    async fn write(&self, node: &NodeId, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Fetch the value under `key` from `node`.
    async fn read(&self, node: &NodeId, key: &str) -> Result<Option<Value>, StoreError>;
}

#[derive(Serialize)]
struct PutBody<'a> {
    key: &'a str,
    value: &'a Value,
}

#[derive(Deserialize)]
struct GetBody {
    value: Value,
}

/// HTTP transport to the storage nodes.
///
/// Write: `PUT http://<node>/put` with `{"key": k, "value": v}`.
/// Read: `GET http://<node>/get?key=k`, 404 meaning the key is absent.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new() -> Result<Self, StoreError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReplicaStore for HttpStore {
    async fn write(&self, node: &NodeId, key: &str, value: &Value) -> Result<(), StoreError> {
        let url = format!("http://{}/put", node);
        self.client
            .put(url)
            .json(&PutBody { key, value })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn read(&self, node: &NodeId, key: &str) -> Result<Option<Value>, StoreError> {
        let url = format!("http://{}/get", node);
        let response = self.client.get(url).query(&[("key", key)]).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: GetBody = response.error_for_status()?.json().await?;
        Ok(Some(body.value))
    }
}

/// In-process replica set keyed by node id.
///
/// Backs the quorum and coordinator tests: nodes can be taken down (every
/// request errors, as a crashed backend would) and revived, and test code
/// can seed or inspect a replica's keyspace directly.
#[derive(Debug, Default)]
pub struct MemStore {
    data: Mutex<HashMap<NodeId, HashMap<String, Value>>>,
    down: Mutex<HashSet<NodeId>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request to `node` fail.
    pub fn set_down(&self, node: &NodeId) {
        self.down.lock().insert(node.clone());
    }

    /// Undo `set_down`; previously stored data is still there.
    pub fn revive(&self, node: &NodeId) {
        self.down.lock().remove(node);
    }

    /// Store a value on one replica without going through the replicator.
    pub fn seed(&self, node: &NodeId, key: &str, value: Value) {
        self.data
            .lock()
            .entry(node.clone())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Inspect one replica's copy of a key.
    pub fn value(&self, node: &NodeId, key: &str) -> Option<Value> {
        self.data
            .lock()
            .get(node)
            .and_then(|keys| keys.get(key))
            .cloned()
    }

    fn check_up(&self, node: &NodeId) -> Result<(), StoreError> {
        if self.down.lock().contains(node) {
            Err(StoreError::Unavailable(node.clone()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ReplicaStore for MemStore {
    async fn write(&self, node: &NodeId, key: &str, value: &Value) -> Result<(), StoreError> {
        self.check_up(node)?;
        self.seed(node, key, value.clone());
        Ok(())
    }

    async fn read(&self, node: &NodeId, key: &str) -> Result<Option<Value>, StoreError> {
        self.check_up(node)?;
        Ok(self.value(node, key))
    }
}
