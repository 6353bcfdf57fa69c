//! Outbound RPCs.

use crate::codec::{read_frame, write_frame};
use crate::error::TransportError;
use crate::protocol::{Envelope, Reply, Request, Response};
use corelib::{Error, Identifier, NodeRef, NodeStatus, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Issues requests to other nodes, one connection per call.
///
/// Every call is bounded by the configured timeout; a call that times out or
/// cannot connect fails with `RemoteUnreachable` and is never retried here.
#[derive(Clone, Debug)]
pub struct RpcClient {
    bits: u8,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(bits: u8, timeout: Duration) -> Self {
        Self { bits, timeout }
    }

    /// Send `request` to `addr` and wait for its reply.
    pub async fn call(&self, addr: &str, request: Request) -> Result<Response> {
        let method = request.method();
        let envelope = Envelope {
            bits: self.bits,
            request,
        };
        debug!(%addr, method, "rpc call");
        match tokio::time::timeout(self.timeout, exchange(addr, &envelope)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                warn!(%addr, method, error = %err, "rpc failed");
                Err(err.into_ring_error(addr))
            }
            Err(_) => {
                warn!(%addr, method, timeout = ?self.timeout, "rpc timed out");
                Err(Error::unreachable(
                    addr,
                    format!("no reply to {} within {:?}", method, self.timeout),
                ))
            }
        }
    }

    pub async fn find_successor(&self, addr: &str, id: Identifier) -> Result<NodeRef> {
        match self.call(addr, Request::FindSuccessor { id }).await? {
            Response::Node(node) => Ok(node),
            other => Err(other.unexpected("find_successor")),
        }
    }

    pub async fn get_successor(&self, addr: &str) -> Result<NodeRef> {
        match self.call(addr, Request::GetSuccessor).await? {
            Response::Node(node) => Ok(node),
            other => Err(other.unexpected("get_successor")),
        }
    }

    pub async fn get_predecessor(&self, addr: &str) -> Result<Option<NodeRef>> {
        match self.call(addr, Request::GetPredecessor).await? {
            Response::Predecessor(node) => Ok(node),
            other => Err(other.unexpected("get_predecessor")),
        }
    }

    pub async fn set_predecessor(&self, addr: &str, node: &NodeRef) -> Result<()> {
        let request = Request::SetPredecessor { node: node.clone() };
        match self.call(addr, request).await? {
            Response::Ack => Ok(()),
            other => Err(other.unexpected("set_predecessor")),
        }
    }

    pub async fn closest_preceding_finger(&self, addr: &str, id: Identifier) -> Result<NodeRef> {
        match self.call(addr, Request::ClosestPrecedingFinger { id }).await? {
            Response::Node(node) => Ok(node),
            other => Err(other.unexpected("closest_preceding_finger")),
        }
    }

    /// Returns whether the finger changed and the callee's predecessor.
    pub async fn update_finger_table(
        &self,
        addr: &str,
        node: &NodeRef,
        index: usize,
    ) -> Result<(bool, Option<NodeRef>)> {
        let request = Request::UpdateFingerTable {
            node: node.clone(),
            index,
        };
        match self.call(addr, request).await? {
            Response::FingerUpdated {
                changed,
                predecessor,
            } => Ok((changed, predecessor)),
            other => Err(other.unexpected("update_finger_table")),
        }
    }

    pub async fn restore_finger(
        &self,
        addr: &str,
        index: usize,
        current: &NodeRef,
        node: &NodeRef,
    ) -> Result<()> {
        let request = Request::RestoreFinger {
            index,
            current: current.clone(),
            node: node.clone(),
        };
        match self.call(addr, request).await? {
            Response::Ack => Ok(()),
            other => Err(other.unexpected("restore_finger")),
        }
    }

    pub async fn get_key(&self, addr: &str, key: Identifier) -> Result<Option<Vec<u8>>> {
        match self.call(addr, Request::GetKey { key }).await? {
            Response::Value(value) => Ok(value),
            other => Err(other.unexpected("get_key")),
        }
    }

    pub async fn put_key(&self, addr: &str, key: Identifier, value: Vec<u8>) -> Result<()> {
        match self.call(addr, Request::PutKey { key, value }).await? {
            Response::Ack => Ok(()),
            other => Err(other.unexpected("put_key")),
        }
    }

    pub async fn transfer_keys(
        &self,
        addr: &str,
        lo: Identifier,
        hi: Identifier,
    ) -> Result<Vec<(Identifier, Vec<u8>)>> {
        match self.call(addr, Request::TransferKeys { lo, hi }).await? {
            Response::Keys(entries) => Ok(entries),
            other => Err(other.unexpected("transfer_keys")),
        }
    }

    pub async fn status(&self, addr: &str) -> Result<NodeStatus> {
        match self.call(addr, Request::Status).await? {
            Response::Status(status) => Ok(status),
            other => Err(other.unexpected("status")),
        }
    }
}

async fn exchange(addr: &str, envelope: &Envelope) -> std::result::Result<Reply, TransportError> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    write_frame(&mut stream, envelope).await?;
    read_frame(&mut stream).await
}
