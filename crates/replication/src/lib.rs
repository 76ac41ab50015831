//! Quorum replication for the key-value store.
//!
//! This crate fans PUT/GET requests out to the replicas responsible for a
//! key and accounts for quorum thresholds:
//!
//! - `ReplicaStore`: the transport seam a replica is reached through
//! - `HttpStore`: the production transport (HTTP to storage nodes)
//! - `Replicator`: parallel fan-out, quorum accounting, read-repair

pub mod error;
pub mod quorum;
pub mod store;

pub use error::StoreError;
pub use quorum::{QuorumConfig, Replicator};
pub use store::{HttpStore, MemStore, ReplicaStore, DEFAULT_REQUEST_TIMEOUT};
