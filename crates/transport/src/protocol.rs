//! Wire protocol for ring RPCs.
//!
//! Each connection carries exactly one [`Envelope`] from caller to callee and
//! one [`Reply`] back. The enum variant is the method tag; its fields are the
//! arguments.

use corelib::{Error, Identifier, NodeRef, NodeStatus};
use serde::{Deserialize, Serialize};

/// A request stamped with the caller's identifier width, so that nodes of
/// differently sized rings refuse to talk to each other.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub bits: u8,
    pub request: Request,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Resolve the node owning `id`, routing through the callee.
    FindSuccessor { id: Identifier },
    /// The callee's first finger.
    GetSuccessor,
    GetPredecessor,
    /// Overwrite the callee's predecessor pointer (join step 3).
    SetPredecessor { node: NodeRef },
    /// One routing step of `find_predecessor`, answered from the callee's
    /// finger table only.
    ClosestPrecedingFinger { id: Identifier },
    /// Offer `node` as the owner of the callee's finger `index`.
    UpdateFingerTable { node: NodeRef, index: usize },
    /// Point the callee's finger `index` back at `node` if it still holds
    /// `current`.
    RestoreFinger {
        index: usize,
        current: NodeRef,
        node: NodeRef,
    },
    GetKey { key: Identifier },
    PutKey { key: Identifier, value: Vec<u8> },
    /// Remove and return every entry with a key in `(lo, hi]`.
    TransferKeys { lo: Identifier, hi: Identifier },
    Status,
}

impl Request {
    /// Method name, for logs.
    pub fn method(&self) -> &'static str {
        match self {
            Request::FindSuccessor { .. } => "find_successor",
            Request::GetSuccessor => "get_successor",
            Request::GetPredecessor => "get_predecessor",
            Request::SetPredecessor { .. } => "set_predecessor",
            Request::ClosestPrecedingFinger { .. } => "closest_preceding_finger",
            Request::UpdateFingerTable { .. } => "update_finger_table",
            Request::RestoreFinger { .. } => "restore_finger",
            Request::GetKey { .. } => "get_key",
            Request::PutKey { .. } => "put_key",
            Request::TransferKeys { .. } => "transfer_keys",
            Request::Status => "status",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Node(NodeRef),
    Predecessor(Option<NodeRef>),
    /// Outcome of `UpdateFingerTable`: whether the entry changed, and the
    /// callee's predecessor to forward the correction to.
    FingerUpdated {
        changed: bool,
        predecessor: Option<NodeRef>,
    },
    Value(Option<Vec<u8>>),
    Keys(Vec<(Identifier, Vec<u8>)>),
    Status(NodeStatus),
    Ack,
}

/// What travels back on the wire. Remote failures keep their kind.
pub type Reply = Result<Response, Error>;

impl Response {
    /// Error for a response variant the caller did not ask for.
    pub fn unexpected(self, method: &str) -> Error {
        Error::ProtocolViolation(format!("unexpected response to {}: {:?}", method, self))
    }
}
