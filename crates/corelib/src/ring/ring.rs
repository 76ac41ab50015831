//! Hash ring data structure.
//!
//! Holds the sorted token index together with each node's liveness status,
//! and answers `get_nodes` queries with an ordered, deduplicated list of
//! online replicas for a key.

use std::collections::{BTreeMap, HashMap, HashSet};

use parking_lot::RwLock;

use crate::node::{NodeId, NodeStatus};
use crate::token::RingToken;
use crate::vnode::VirtualNode;

/// Default number of virtual replicas per physical node.
pub const DEFAULT_VNODES: usize = 3;

/// Everything `get_nodes` reads, behind one lock so the sorted index and
/// the status map are always a consistent snapshot.
#[derive(Debug, Default)]
struct RingState {
    /// Sorted token -> owning node. Entries survive node removal so the
    /// clockwise walk stays positionally stable.
    entries: BTreeMap<RingToken, NodeId>,
    /// Liveness per physical node. Offline is sticky.
    status: HashMap<NodeId, NodeStatus>,
}

/// Consistent hash ring with virtual nodes.
///
/// Interior-mutable: lookups happen on every client request while
/// membership changes are rare, so a read-write lock over a single state
/// struct is enough. No lock is ever held across I/O.
///
/// # Performance
///
/// - `get_nodes`: O(log t + w) where t = tokens, w = entries walked
/// - `add_node`: O(v log t) for v virtual replicas
/// - `remove_node`: O(1) (status flip only)
#[derive(Debug)]
pub struct HashRing {
    state: RwLock<RingState>,
    vnodes: usize,
}

impl HashRing {
    /// Create an empty ring with the default virtual-replica count.
    pub fn new() -> Self {
        Self::with_vnodes(DEFAULT_VNODES)
    }

    /// Create an empty ring with `vnodes` virtual replicas per node.
    pub fn with_vnodes(vnodes: usize) -> Self {
        Self {
            state: RwLock::new(RingState::default()),
            vnodes,
        }
    }

    /// Insert a node and its virtual replicas, marking it online.
    ///
    /// Idempotent for a node that is already online: the virtual labels
    /// hash to the same tokens, so re-inserting them changes nothing.
    pub fn add_node(&self, node: &NodeId) {
        let mut state = self.state.write();
        for i in 0..self.vnodes {
            let vnode = VirtualNode::from_index(node, i);
            state.entries.insert(vnode.token, vnode.node_id);
        }
        state.status.insert(node.clone(), NodeStatus::Online);
    }

    /// Flip a node's status to offline.
    ///
    /// The virtual entries remain in the sorted structure so the clockwise
    /// walk is stable under concurrent lookups; `get_nodes` filters offline
    /// owners instead. Returns `false` for a node the ring has never seen.
    pub fn remove_node(&self, node: &NodeId) -> bool {
        let mut state = self.state.write();
        match state.status.get_mut(node) {
            Some(status) => {
                *status = NodeStatus::Offline;
                true
            }
            None => false,
        }
    }

    /// Ordered list of distinct online replicas for `key`.
    ///
    /// # Algorithm
    ///
    /// 1. Hash the key to a ring token
    /// 2. Locate the smallest entry with token >= hash (wrap to the first)
    /// 3. Walk clockwise, emitting each owner at most once and only if
    ///    online, until `count` are collected or the walk has done one
    ///    full lap
    ///
    /// Returns fewer than `count` nodes when fewer distinct online nodes
    /// exist, and an empty list on an empty ring.
    pub fn get_nodes(&self, key: &str, count: usize) -> Vec<NodeId> {
        let state = self.state.read();
        if count == 0 || state.entries.is_empty() {
            return Vec::new();
        }

        let hash = RingToken::from_key(key);
        let mut replicas = Vec::with_capacity(count);
        let mut seen = HashSet::new();

        let walk = state
            .entries
            .range(hash..)
            .chain(state.entries.range(..hash));
        for (_, node) in walk {
            if !seen.insert(node) {
                continue;
            }
            if state.status.get(node).is_some_and(|s| s.is_online()) {
                replicas.push(node.clone());
                if replicas.len() == count {
                    break;
                }
            }
        }

        replicas
    }

    /// Liveness status of a node, if the ring knows it.
    pub fn status(&self, node: &NodeId) -> Option<NodeStatus> {
        self.state.read().status.get(node).copied()
    }

    /// Number of physical nodes ever added (online and offline).
    pub fn node_count(&self) -> usize {
        self.state.read().status.len()
    }

    /// Number of nodes currently online.
    pub fn online_count(&self) -> usize {
        self.state
            .read()
            .status
            .values()
            .filter(|s| s.is_online())
            .count()
    }

    /// Number of token positions on the ring.
    pub fn token_count(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// All nodes with their status, unordered.
    pub fn nodes(&self) -> Vec<(NodeId, NodeStatus)> {
        self.state
            .read()
            .status
            .iter()
            .map(|(id, status)| (id.clone(), *status))
            .collect()
    }

    /// All token positions in ring order, for inspection.
    pub fn tokens(&self) -> Vec<VirtualNode> {
        self.state
            .read()
            .entries
            .iter()
            .map(|(token, node)| VirtualNode::new(*token, node.clone()))
            .collect()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for seeding a ring at service startup.
///
/// ```
/// use corelib::ring::RingBuilder;
///
/// let ring = RingBuilder::new()
///     .with_vnodes(3)
///     .add_node("localhost:8001".parse().unwrap())
///     .add_node("localhost:8002".parse().unwrap())
///     .build();
/// assert_eq!(ring.node_count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct RingBuilder {
    vnodes: Option<usize>,
    nodes: Vec<NodeId>,
}

impl RingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual replicas per node (default 3).
    pub fn with_vnodes(mut self, vnodes: usize) -> Self {
        self.vnodes = Some(vnodes);
        self
    }

    pub fn add_node(mut self, node: NodeId) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn add_nodes(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    pub fn build(self) -> HashRing {
        let ring = HashRing::with_vnodes(self.vnodes.unwrap_or(DEFAULT_VNODES));
        for node in &self.nodes {
            ring.add_node(node);
        }
        ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    #[test]
    fn test_entries_survive_removal() {
        let ring = HashRing::new();
        ring.add_node(&node("a:1"));
        ring.add_node(&node("b:2"));
        assert_eq!(ring.token_count(), 6);

        ring.remove_node(&node("a:1"));
        // Status flips, positions stay.
        assert_eq!(ring.token_count(), 6);
        assert_eq!(ring.status(&node("a:1")), Some(NodeStatus::Offline));
        assert_eq!(ring.online_count(), 1);
    }

    #[test]
    fn test_remove_unknown_node() {
        let ring = HashRing::new();
        ring.add_node(&node("a:1"));
        assert!(!ring.remove_node(&node("z:9")));
        assert!(ring.remove_node(&node("a:1")));
    }

    #[test]
    fn test_add_is_idempotent() {
        let ring = HashRing::new();
        ring.add_node(&node("a:1"));
        ring.add_node(&node("a:1"));
        assert_eq!(ring.token_count(), DEFAULT_VNODES);
        assert_eq!(ring.node_count(), 1);
    }
}
