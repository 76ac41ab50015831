//! Core library for the quorum key-value store.
//!
//! This crate provides the fundamental abstractions the coordinator builds on:
//! - Node identity and liveness status
//! - Ring tokens (128-bit hash positions)
//! - Virtual node abstractions
//! - The consistent hash ring and replica routing

pub mod error;
pub mod node;
pub mod ring;
pub mod token;
pub mod vnode;

pub use error::{Error, Result};
pub use node::{NodeId, NodeStatus};
pub use ring::{HashRing, RingBuilder};
pub use token::RingToken;
pub use vnode::VirtualNode;
