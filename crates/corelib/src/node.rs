//! Node identity for the storage cluster.
//!
//! Nodes are identified by their `host:port` endpoint. The identifier is
//! stable for the lifetime of the node; a node restarted under the same
//! endpoint is treated as the same node.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Identifier for a storage node, syntactically `host:port`.
///
/// Cheap to clone and hash; used as the key in the ring, the heartbeat
/// table and every replica-addressed request.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// The raw `host:port` endpoint.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidNode(format!("expected host:port, got {:?}", s)))?;
        if host.is_empty() {
            return Err(Error::InvalidNode(format!("empty host in {:?}", s)));
        }
        if port.parse::<u16>().is_err() {
            return Err(Error::InvalidNode(format!("invalid port in {:?}", s)));
        }
        Ok(NodeId(s.to_string()))
    }
}

/// Liveness status of a node as seen by the coordinator.
///
/// A node starts `Online` when added to the ring and is flipped to
/// `Offline` on a failure notification. Offline is sticky for the
/// lifetime of the coordinator; there is no automatic re-admission.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeStatus {
    Online,
    Offline,
}

impl NodeStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, NodeStatus::Online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_node_id() {
        let id: NodeId = "localhost:8001".parse().unwrap();
        assert_eq!(id.as_str(), "localhost:8001");
        assert_eq!(id.to_string(), "localhost:8001");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("localhost".parse::<NodeId>().is_err());
        assert!(":8001".parse::<NodeId>().is_err());
        assert!("host:notaport".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_ipv6_style_endpoint() {
        // rsplit keeps the last colon as the port separator
        let id: NodeId = "::1:8001".parse().unwrap();
        assert_eq!(id.as_str(), "::1:8001");
    }
}
