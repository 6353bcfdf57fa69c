//! Joining an existing ring.
//!
//! 1. Forget the predecessor.
//! 2. Resolve the finger table through the contact node.
//! 3. Adopt the successor's predecessor and become the successor's new
//!    predecessor.
//! 4. Pull the keys in `(predecessor, self]` from the successor.
//! 5. Correct the fingers of every node that should now point here.
//!
//! A failure before step 3 leaves the ring untouched. A failure after it
//! undoes the finger corrections made so far, gives the successor its
//! predecessor back and returns the migrated keys to it.

use crate::node::RingNode;
use corelib::{Error, FingerTable, NodeRef, Phase, Result};
use tracing::{debug, info, warn};

impl RingNode {
    pub(crate) async fn join(&self, contact: &str) -> Result<()> {
        info!(node = %self.me, %contact, "joining ring");
        {
            let mut state = self.state.lock();
            state.phase = Phase::Joining;
            state.predecessor = None;
        }

        let fingers = self.init_finger_table(contact).await?;
        let successor = fingers[0].clone();
        let predecessor = self
            .rpc
            .get_predecessor(&successor.addr)
            .await?
            .ok_or_else(|| {
                Error::RoutingFailure(format!("successor {} has no predecessor yet", successor))
            })?;
        if predecessor.id == self.me.id {
            return Err(Error::RoutingFailure(format!(
                "identifier {} is already taken by {}",
                self.me.id, predecessor.addr
            )));
        }
        {
            let mut state = self.state.lock();
            state.fingers = FingerTable::from_nodes(self.me.clone(), self.space, fingers);
            state.predecessor = Some(predecessor.clone());
        }

        let mut corrected = Vec::new();
        if let Err(err) = self.link(&successor, &predecessor, &mut corrected).await {
            warn!(node = %self.me, %successor, error = %err, "join failed, rolling back");
            self.unlink(&successor, &predecessor, &corrected).await;
            return Err(err);
        }

        self.state.lock().phase = Phase::Stable;
        info!(node = %self.me, %successor, %predecessor, "joined ring");
        Ok(())
    }

    /// Steps 3 to 5.
    async fn link(
        &self,
        successor: &NodeRef,
        predecessor: &NodeRef,
        corrected: &mut Vec<(NodeRef, usize)>,
    ) -> Result<()> {
        self.rpc.set_predecessor(&successor.addr, &self.me).await?;
        self.migrate_keys(successor, predecessor).await?;
        self.update_others(corrected).await
    }

    /// Best-effort undo of steps 3 to 5.
    async fn unlink(&self, successor: &NodeRef, predecessor: &NodeRef, corrected: &[(NodeRef, usize)]) {
        for (peer, index) in corrected {
            if let Err(err) = self.rpc.restore_finger(&peer.addr, *index, &self.me, successor).await {
                warn!(node = %self.me, %peer, finger = index, error = %err, "could not restore finger");
            }
        }
        if let Err(err) = self.rpc.set_predecessor(&successor.addr, predecessor).await {
            warn!(node = %self.me, %successor, error = %err, "could not restore predecessor");
        }
        let entries = self.state.lock().shard.take_range(&self.space, predecessor.id, self.me.id);
        let mut returned = 0;
        for (key, value) in entries {
            match self.rpc.put_key(&successor.addr, key, value).await {
                Ok(()) => returned += 1,
                Err(err) => warn!(node = %self.me, %successor, %key, error = %err, "could not return key"),
            }
        }
        info!(node = %self.me, %successor, returned, "join rolled back");
    }

    /// Resolve all m fingers through `contact`.
    ///
    /// A finger whose start also falls before the previous finger's node
    /// reuses it without a remote call. Since the ring does not know this
    /// node yet, a remote answer lying past this node is replaced by this
    /// node.
    async fn init_finger_table(&self, contact: &str) -> Result<Vec<NodeRef>> {
        let m = self.space.bits() as usize;
        let mut nodes: Vec<NodeRef> = Vec::with_capacity(m);
        for i in 1..=m {
            let start = self.space.finger_start(self.me.id, i);
            let reuse = nodes
                .last()
                .filter(|prev| self.space.in_interval(start, self.me.id, prev.id, true, false))
                .cloned();
            let owner = match reuse {
                Some(prev) => prev,
                None => {
                    let found = self.rpc.find_successor(contact, start).await?;
                    if found.id == self.me.id {
                        return Err(Error::RoutingFailure(format!(
                            "identifier {} is already taken by {}",
                            self.me.id, found.addr
                        )));
                    }
                    if self.space.distance(start, self.me.id) < self.space.distance(start, found.id) {
                        self.me.clone()
                    } else {
                        found
                    }
                }
            };
            debug!(node = %self.me, finger = i, %start, owner = %owner, "finger resolved");
            nodes.push(owner);
        }
        Ok(nodes)
    }

    async fn migrate_keys(&self, successor: &NodeRef, predecessor: &NodeRef) -> Result<()> {
        let entries = self
            .rpc
            .transfer_keys(&successor.addr, predecessor.id, self.me.id)
            .await?;
        let moved = entries.len();
        self.state.lock().shard.absorb(entries);
        info!(node = %self.me, from = %successor, moved, "keys migrated");
        Ok(())
    }

    /// Offer this node as finger `i` to every node that may now need it.
    ///
    /// For each `i`, the first candidate is the last node at or before
    /// `self - 2^(i-1)`. From there the correction walks predecessors for as
    /// long as the offer keeps being accepted. Every accepted offer is
    /// recorded in `corrected`.
    async fn update_others(&self, corrected: &mut Vec<(NodeRef, usize)>) -> Result<()> {
        let m = self.space.bits() as usize;
        for i in 1..=m {
            let behind = self.space.sub(self.me.id, 1u64 << (i - 1));
            let mut peer = self.find_predecessor(self.space.add(behind, 1)).await?;
            let mut forwards = 0;
            while peer.id != self.me.id {
                let (changed, predecessor) =
                    self.rpc.update_finger_table(&peer.addr, &self.me, i).await?;
                debug!(node = %self.me, finger = i, %peer, changed, "finger update offered");
                if changed {
                    corrected.push((peer.clone(), i));
                }
                let Some(next) = predecessor.filter(|_| changed) else {
                    break;
                };
                forwards += 1;
                if forwards >= self.config.max_update_forwards {
                    warn!(node = %self.me, finger = i, forwards, "finger update propagation cut short");
                    break;
                }
                peer = next;
            }
        }
        Ok(())
    }
}
