//! Node references for the Chord ring.
//!
//! A `NodeRef` is what nodes hand each other over the wire: the node's ring
//! identifier plus the endpoint its RPC server listens on. It is small and
//! cheap to clone; the heavy per-node state lives in the owning process.

use crate::finger::FingerEntry;
use crate::identifier::Identifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a participant in the ring.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: Identifier,
    /// `host:port` of the node's RPC listener.
    pub addr: String,
}

impl NodeRef {
    pub fn new(id: Identifier, addr: impl Into<String>) -> Self {
        Self {
            id,
            addr: addr.into(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.addr)
    }
}

/// Lifecycle of a ring node. `Uninitialized` is never observable from
/// outside since a node only answers RPCs once constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Uninitialized,
    Joining,
    Stable,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Joining => "joining",
            Phase::Stable => "stable",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a node's routing state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node: NodeRef,
    pub phase: Phase,
    pub predecessor: Option<NodeRef>,
    pub fingers: Vec<FingerEntry>,
    pub keys: usize,
}

impl NodeStatus {
    /// The node's successor (its first finger).
    pub fn successor(&self) -> Option<&NodeRef> {
        self.fingers.first().map(|entry| &entry.node)
    }
}
