//! Talking to a ring from outside it.

use corelib::{Error, IdentifierSpace, Key, NodeRef, NodeStatus, Result, RingConfig};
use transport::RpcClient;

/// Routes requests through one entry node without joining the ring.
pub struct RingClient {
    rpc: RpcClient,
    space: IdentifierSpace,
    entry: String,
}

impl RingClient {
    pub fn new(entry: impl Into<String>, config: &RingConfig) -> Result<Self> {
        config.validate()?;
        let space = config.space()?;
        Ok(Self {
            rpc: RpcClient::new(space.bits(), config.rpc_timeout()),
            space,
            entry: entry.into(),
        })
    }

    /// The node currently responsible for `key`.
    pub async fn owner(&self, key: impl Into<Key>) -> Result<NodeRef> {
        let id = self.space.key_id(&key.into())?;
        self.rpc.find_successor(&self.entry, id).await
    }

    pub async fn insert(&self, key: impl Into<Key>, value: Vec<u8>) -> Result<NodeRef> {
        let id = self.space.key_id(&key.into())?;
        let owner = self.rpc.find_successor(&self.entry, id).await?;
        self.rpc.put_key(&owner.addr, id, value).await?;
        Ok(owner)
    }

    pub async fn lookup(&self, key: impl Into<Key>) -> Result<Vec<u8>> {
        let id = self.space.key_id(&key.into())?;
        let owner = self.rpc.find_successor(&self.entry, id).await?;
        self.rpc
            .get_key(&owner.addr, id)
            .await?
            .ok_or(Error::KeyNotFound(id))
    }

    /// Status of the entry node, or of `addr` when given.
    pub async fn status(&self, addr: Option<&str>) -> Result<NodeStatus> {
        self.rpc.status(addr.unwrap_or(&self.entry)).await
    }
}
