//! Per-node finger tables.
//!
//! Entry `i` (1-indexed) of node `n` caches the owner of
//! `(n + 2^(i-1)) mod 2^m`. Starts are fixed when the table is built; the
//! cached nodes are routing hints that may go stale, only entry 1 (the
//! successor) matters for correctness.

use crate::identifier::Identifier;
use crate::node::NodeRef;
use crate::space::IdentifierSpace;
use serde::{Deserialize, Serialize};

/// One routing entry: the start of its interval and the cached owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerEntry {
    pub start: Identifier,
    pub node: NodeRef,
}

/// The m routing shortcuts of a single node.
#[derive(Clone, Debug)]
pub struct FingerTable {
    owner: NodeRef,
    space: IdentifierSpace,
    entries: Vec<FingerEntry>,
}

impl FingerTable {
    /// Table of the first node of a ring: every entry points back at `owner`.
    pub fn new(owner: NodeRef, space: IdentifierSpace) -> Self {
        let nodes = vec![owner.clone(); space.bits() as usize];
        Self::from_nodes(owner, space, nodes)
    }

    /// Table built from already resolved owners, `nodes[i - 1]` being the
    /// owner of finger `i`.
    ///
    /// # Panics
    ///
    /// If `nodes` does not hold exactly m entries.
    pub fn from_nodes(owner: NodeRef, space: IdentifierSpace, nodes: Vec<NodeRef>) -> Self {
        assert_eq!(
            nodes.len(),
            space.bits() as usize,
            "finger table needs one entry per identifier bit"
        );
        let entries = nodes
            .into_iter()
            .enumerate()
            .map(|(idx, node)| FingerEntry {
                start: space.finger_start(owner.id, idx + 1),
                node,
            })
            .collect();
        Self {
            owner,
            space,
            entries,
        }
    }

    pub fn owner(&self) -> &NodeRef {
        &self.owner
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owner cached in finger `i`, `None` outside `[1, m]`.
    pub fn get(&self, i: usize) -> Option<&NodeRef> {
        self.entry(i).map(|entry| &entry.node)
    }

    pub fn entry(&self, i: usize) -> Option<&FingerEntry> {
        i.checked_sub(1).and_then(|idx| self.entries.get(idx))
    }

    /// The successor is always finger 1.
    pub fn successor(&self) -> &NodeRef {
        &self.entries[0].node
    }

    pub fn entries(&self) -> &[FingerEntry] {
        &self.entries
    }

    /// Farthest finger that lies strictly between the owner and `id`,
    /// scanning from finger m down to finger 1. Falls back to the owner.
    pub fn closest_preceding_finger(&self, id: Identifier) -> &NodeRef {
        self.entries
            .iter()
            .rev()
            .map(|entry| &entry.node)
            .find(|node| self.space.in_interval(node.id, self.owner.id, id, false, false))
            .unwrap_or(&self.owner)
    }

    /// Point finger `i` back at `node` if it still holds `current`. Used to
    /// undo the corrections of a join that did not complete. Returns whether
    /// the entry changed.
    pub fn restore(&mut self, i: usize, current: &NodeRef, node: &NodeRef) -> bool {
        match i.checked_sub(1).and_then(|idx| self.entries.get_mut(idx)) {
            Some(entry) if entry.node.id == current.id && current.id != node.id => {
                entry.node = node.clone();
                true
            }
            _ => false,
        }
    }

    /// Offer `candidate` as the new owner of finger `i`.
    ///
    /// The entry is replaced when the candidate lies in
    /// `[owner, current entry)`. Offering the owner itself, the current entry
    /// or an index outside `[1, m]` never changes anything. Returns whether
    /// the entry changed.
    pub fn update(&mut self, i: usize, candidate: &NodeRef) -> bool {
        let owner = self.owner.id;
        let space = self.space;
        let Some(entry) = i.checked_sub(1).and_then(|idx| self.entries.get_mut(idx)) else {
            return false;
        };
        if candidate.id == owner || candidate.id == entry.node.id {
            return false;
        }
        if space.in_interval(candidate.id, owner, entry.node.id, true, false) {
            entry.node = candidate.clone();
            true
        } else {
            false
        }
    }
}
