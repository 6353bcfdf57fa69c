//! RPC dispatch for a ring node.

use crate::node::RingNode;
use async_trait::async_trait;
use corelib::{Error, Identifier, Phase, Result};
use tracing::debug;
use transport::{Reply, Request, Response, RpcHandler};

impl RingNode {
    fn check_id(&self, id: Identifier) -> Result<()> {
        if self.space.contains(id.0) {
            Ok(())
        } else {
            Err(Error::ProtocolViolation(format!(
                "identifier {} outside the {}-bit ring",
                id,
                self.space.bits()
            )))
        }
    }
}

#[async_trait]
impl RpcHandler for RingNode {
    async fn handle(&self, request: Request) -> Reply {
        match request {
            Request::FindSuccessor { id } => {
                self.check_id(id)?;
                if self.phase() == Phase::Joining {
                    // fingers may be partially built; answered anyway
                    debug!(node = %self.me, %id, "lookup while joining");
                }
                self.find_successor(id).await.map(Response::Node)
            }
            Request::GetSuccessor => Ok(Response::Node(self.successor())),
            Request::GetPredecessor => Ok(Response::Predecessor(self.predecessor())),
            Request::SetPredecessor { node } => {
                self.check_id(node.id)?;
                self.set_predecessor(node);
                Ok(Response::Ack)
            }
            Request::ClosestPrecedingFinger { id } => {
                self.check_id(id)?;
                Ok(Response::Node(self.closest_preceding_finger(id)))
            }
            Request::UpdateFingerTable { node, index } => {
                self.check_id(node.id)?;
                let (changed, predecessor) = self.apply_finger_update(&node, index)?;
                Ok(Response::FingerUpdated {
                    changed,
                    predecessor,
                })
            }
            Request::RestoreFinger {
                index,
                current,
                node,
            } => {
                self.check_id(current.id)?;
                self.check_id(node.id)?;
                self.apply_finger_restore(index, &current, &node)?;
                Ok(Response::Ack)
            }
            Request::GetKey { key } => {
                self.check_id(key)?;
                self.load_local(key).map(Response::Value)
            }
            Request::PutKey { key, value } => {
                self.check_id(key)?;
                self.store_local(key, value)?;
                Ok(Response::Ack)
            }
            Request::TransferKeys { lo, hi } => {
                self.check_id(lo)?;
                self.check_id(hi)?;
                Ok(Response::Keys(self.hand_over(lo, hi)))
            }
            Request::Status => Ok(Response::Status(self.status())),
        }
    }
}
