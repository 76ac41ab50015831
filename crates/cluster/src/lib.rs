//! Long-running services of the quorum key-value store.
//!
//! Three daemons, each with its own binary:
//! - `coordinator`: routes client PUT/GET through the ring and the
//!   quorum replicator, reacts to failure notifications
//! - `fault_detector`: collects heartbeats and reports silent nodes
//!   to the coordinator
//! - `node`: a single storage node (in-memory key space plus a
//!   heartbeat sender)

pub mod coordinator;
pub mod detector;
pub mod shutdown;
pub mod storage;
