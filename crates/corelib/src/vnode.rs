//! Virtual node abstractions.
//!
//! Each physical node occupies several positions on the ring (virtual
//! replicas), which smooths key distribution and limits how many keys
//! relocate when membership changes.
//!
//! # Invariants
//!
//! - Every `VirtualNode` belongs to exactly one physical node
//! - The token is derived from the label `"{node}-{index}"`, so placement
//!   is reproducible across restarts
//! - Ordering is by token, i.e. ring order

use crate::node::NodeId;
use crate::token::RingToken;

/// A single token position owned by a physical node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualNode {
    /// Token position on the ring.
    pub token: RingToken,
    /// The physical node that owns this virtual node.
    pub node_id: NodeId,
}

impl VirtualNode {
    pub fn new(token: RingToken, node_id: NodeId) -> Self {
        Self { token, node_id }
    }

    /// Create the `index`-th virtual node for a physical node.
    ///
    /// The token is the hash of `"{node}-{index}"`, the same function used
    /// for keys.
    pub fn from_index(node_id: &NodeId, index: usize) -> Self {
        let label = format!("{}-{}", node_id, index);
        Self::new(RingToken::from_key(&label), node_id.clone())
    }
}

impl std::fmt::Display for VirtualNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VNode(token={}, node={})", self.token, self.node_id)
    }
}
