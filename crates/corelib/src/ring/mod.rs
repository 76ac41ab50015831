//! Consistent hash ring implementation.
//!
//! The ring manages token positions and provides the replica routing
//! operation for finding the nodes responsible for a key.

pub mod ring;

pub use ring::{HashRing, RingBuilder, DEFAULT_VNODES};
