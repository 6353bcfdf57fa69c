//! A single participant of the ring.
//!
//! `RingNode` owns its identifier, finger table, predecessor pointer and key
//! shard behind one mutex. The lock only ever covers in-memory reads and
//! writes; every outbound RPC happens with the lock released, so a node
//! waiting on a peer can still serve that peer's calls.

use crate::config::NodeConfig;
use corelib::{
    Error, FingerTable, Identifier, IdentifierSpace, Key, KeyValueShard, NodeRef, NodeStatus,
    Phase, Result, RingConfig,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};
use transport::{RpcClient, RpcServer};

#[derive(Debug)]
pub(crate) struct NodeState {
    pub(crate) phase: Phase,
    pub(crate) fingers: FingerTable,
    pub(crate) predecessor: Option<NodeRef>,
    pub(crate) shard: KeyValueShard,
}

#[derive(Debug)]
pub struct RingNode {
    pub(crate) me: NodeRef,
    pub(crate) space: IdentifierSpace,
    pub(crate) config: RingConfig,
    pub(crate) rpc: RpcClient,
    pub(crate) state: Mutex<NodeState>,
    shutdown: watch::Sender<bool>,
}

impl RingNode {
    fn new(me: NodeRef, space: IdentifierSpace, config: RingConfig, shutdown: watch::Sender<bool>) -> Self {
        let rpc = RpcClient::new(space.bits(), config.rpc_timeout());
        let state = NodeState {
            phase: Phase::Joining,
            fingers: FingerTable::new(me.clone(), space),
            predecessor: None,
            shard: KeyValueShard::new(),
        };
        Self {
            me,
            space,
            config,
            rpc,
            state: Mutex::new(state),
            shutdown,
        }
    }

    /// Bind the RPC listener, start serving, then seed a new ring or join
    /// the ring of `config.join`.
    ///
    /// The server is up before the join starts. A failed join stops it
    /// again and returns the error.
    pub async fn launch(config: NodeConfig) -> Result<Arc<Self>> {
        config.ring.validate()?;
        let space = config.ring.space()?;
        let server = RpcServer::bind(config.listen.as_str(), space.bits())
            .await
            .map_err(|err| Error::Io(format!("cannot listen on {}: {}", config.listen, err)))?;
        let addr = match &config.advertise {
            Some(addr) => addr.clone(),
            None => {
                let local = server.local_addr()?;
                if local.ip().is_unspecified() {
                    return Err(Error::Misconfigured(format!(
                        "listening on {} needs an advertised address peers can dial",
                        local
                    )));
                }
                local.to_string()
            }
        };
        let id = match config.id {
            Some(raw) => space.checked_id(raw)?,
            None => space.hash_to_id(addr.as_bytes()),
        };

        let (shutdown, signal) = watch::channel(false);
        let node = Arc::new(Self::new(NodeRef::new(id, addr), space, config.ring.clone(), shutdown));
        tokio::spawn(RpcServer::serve(server, Arc::clone(&node), signal));

        match config.join.as_deref() {
            None => node.create(),
            Some(contact) => {
                if let Err(err) = node.join(contact).await {
                    error!(node = %node.me, %contact, error = %err, "join aborted");
                    node.shutdown();
                    return Err(err);
                }
            }
        }
        Ok(node)
    }

    /// Become the only node of a new ring.
    fn create(&self) {
        let mut state = self.state.lock();
        state.fingers = FingerTable::new(self.me.clone(), self.space);
        state.predecessor = Some(self.me.clone());
        state.phase = Phase::Stable;
        info!(node = %self.me, bits = self.space.bits(), "created ring");
    }

    /// Stop accepting RPCs. In-flight handlers run to completion.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn node_ref(&self) -> &NodeRef {
        &self.me
    }

    pub fn id(&self) -> Identifier {
        self.me.id
    }

    pub fn addr(&self) -> &str {
        &self.me.addr
    }

    pub fn space(&self) -> IdentifierSpace {
        self.space
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn successor(&self) -> NodeRef {
        self.state.lock().fingers.successor().clone()
    }

    pub fn predecessor(&self) -> Option<NodeRef> {
        self.state.lock().predecessor.clone()
    }

    pub fn status(&self) -> NodeStatus {
        let state = self.state.lock();
        NodeStatus {
            node: self.me.clone(),
            phase: state.phase,
            predecessor: state.predecessor.clone(),
            fingers: state.fingers.entries().to_vec(),
            keys: state.shard.len(),
        }
    }

    /// Identifiers of the keys currently stored here, ascending.
    pub fn stored_keys(&self) -> Vec<Identifier> {
        self.state.lock().shard.keys().collect()
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// The node owning `id`: the first node at or clockwise after it.
    pub async fn find_successor(&self, id: Identifier) -> Result<NodeRef> {
        let successor = self.successor();
        if self.space.in_interval(id, self.me.id, successor.id, false, true) {
            return Ok(successor);
        }
        let (_, successor) = self.locate(id).await?;
        Ok(successor)
    }

    /// The node `n'` with `id` in `(n', n'.successor]`.
    pub async fn find_predecessor(&self, id: Identifier) -> Result<NodeRef> {
        let (predecessor, _) = self.locate(id).await?;
        Ok(predecessor)
    }

    /// Walk closest preceding fingers from this node until reaching the node
    /// whose successor interval holds `id`. Returns that node and its
    /// successor.
    ///
    /// Every hop must strictly shrink the clockwise arc left to `id`; a hop
    /// that doesn't, or running out of hops, is a routing failure.
    async fn locate(&self, id: Identifier) -> Result<(NodeRef, NodeRef)> {
        let mut current = self.me.clone();
        let mut successor = self.successor();
        let limit = self.config.hop_limit();
        for hop in 0..limit {
            if self.space.in_interval(id, current.id, successor.id, false, true) {
                debug!(node = %self.me, %id, predecessor = %current, hops = hop, "located");
                return Ok((current, successor));
            }
            let next = self.closest_preceding_finger_at(&current, id).await?;
            if self.space.arc(next.id, id) >= self.space.arc(current.id, id) {
                return Err(Error::RoutingFailure(format!(
                    "no progress towards {} at {} (offered {})",
                    id, current, next
                )));
            }
            successor = self.successor_at(&next).await?;
            current = next;
        }
        Err(Error::RoutingFailure(format!(
            "no owner for {} within {} hops",
            id, limit
        )))
    }

    pub fn closest_preceding_finger(&self, id: Identifier) -> NodeRef {
        self.state.lock().fingers.closest_preceding_finger(id).clone()
    }

    async fn closest_preceding_finger_at(&self, node: &NodeRef, id: Identifier) -> Result<NodeRef> {
        if node.id == self.me.id {
            Ok(self.closest_preceding_finger(id))
        } else {
            self.rpc.closest_preceding_finger(&node.addr, id).await
        }
    }

    async fn successor_at(&self, node: &NodeRef) -> Result<NodeRef> {
        if node.id == self.me.id {
            Ok(self.successor())
        } else {
            self.rpc.get_successor(&node.addr).await
        }
    }

    // ------------------------------------------------------------------
    // Client operations
    // ------------------------------------------------------------------

    /// Store `value` under `key` on the owning node. Returns the owner.
    pub async fn insert(&self, key: impl Into<Key>, value: Vec<u8>) -> Result<NodeRef> {
        let id = self.space.key_id(&key.into())?;
        let owner = self.find_successor(id).await?;
        if owner.id == self.me.id {
            self.store_local(id, value)?;
        } else {
            self.rpc.put_key(&owner.addr, id, value).await?;
        }
        debug!(node = %self.me, key = %id, owner = %owner, "inserted");
        Ok(owner)
    }

    /// Fetch the value stored under `key`.
    pub async fn lookup(&self, key: impl Into<Key>) -> Result<Vec<u8>> {
        let id = self.space.key_id(&key.into())?;
        let owner = self.find_successor(id).await?;
        let value = if owner.id == self.me.id {
            self.load_local(id)?
        } else {
            self.rpc.get_key(&owner.addr, id).await?
        };
        value.ok_or(Error::KeyNotFound(id))
    }

    // ------------------------------------------------------------------
    // Local state, shared with the RPC handler
    // ------------------------------------------------------------------

    /// Refuse keys outside `(predecessor, self]`. Nothing is refused before
    /// the predecessor is known.
    fn check_owner(&self, state: &NodeState, key: Identifier) -> Result<()> {
        match &state.predecessor {
            Some(pred) if !self.space.in_interval(key, pred.id, self.me.id, false, true) => {
                Err(Error::RoutingFailure(format!(
                    "{} does not own key {} (predecessor {})",
                    self.me, key, pred
                )))
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn store_local(&self, key: Identifier, value: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock();
        self.check_owner(&state, key)?;
        state.shard.put(key, value);
        Ok(())
    }

    pub(crate) fn load_local(&self, key: Identifier) -> Result<Option<Vec<u8>>> {
        let state = self.state.lock();
        self.check_owner(&state, key)?;
        Ok(state.shard.get(key).cloned())
    }

    pub(crate) fn set_predecessor(&self, node: NodeRef) {
        debug!(node = %self.me, predecessor = %node, "predecessor changed");
        self.state.lock().predecessor = Some(node);
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index == 0 || index > self.space.bits() as usize {
            return Err(Error::ProtocolViolation(format!(
                "finger index {} outside 1..={}",
                index,
                self.space.bits()
            )));
        }
        Ok(())
    }

    /// Apply `update_finger_table(node, index)`; returns whether the finger
    /// changed together with this node's predecessor.
    pub(crate) fn apply_finger_update(
        &self,
        node: &NodeRef,
        index: usize,
    ) -> Result<(bool, Option<NodeRef>)> {
        self.check_index(index)?;
        let mut state = self.state.lock();
        let changed = state.fingers.update(index, node);
        if changed {
            debug!(node = %self.me, index, finger = %node, "finger corrected");
        }
        Ok((changed, state.predecessor.clone()))
    }

    pub(crate) fn apply_finger_restore(
        &self,
        index: usize,
        current: &NodeRef,
        node: &NodeRef,
    ) -> Result<()> {
        self.check_index(index)?;
        if self.state.lock().fingers.restore(index, current, node) {
            debug!(node = %self.me, index, finger = %node, "finger restored");
        }
        Ok(())
    }

    /// Hand over every key in `(lo, hi]` to a joining node.
    pub(crate) fn hand_over(&self, lo: Identifier, hi: Identifier) -> Vec<(Identifier, Vec<u8>)> {
        let entries = self.state.lock().shard.take_range(&self.space, lo, hi);
        info!(node = %self.me, %lo, %hi, moved = entries.len(), "handed over keys");
        entries
    }
}
