//! Error types for replica transport.
//!
//! Errors never cross the quorum boundary: the replicator demotes every
//! failed request to a non-response and keeps counting.

use corelib::NodeId;
use thiserror::Error;

/// A single replica request that did not produce a usable answer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection failure, timeout, or a non-success status from the
    /// storage backend.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The replica refused service (used by in-memory backends).
    #[error("replica {0} unavailable")]
    Unavailable(NodeId),
}
