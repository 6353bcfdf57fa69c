//! The slice of the key space a node currently owns.

use crate::identifier::Identifier;
use crate::space::IdentifierSpace;
use std::collections::BTreeMap;

/// Key/value entries owned by one node, keyed by ring identifier.
#[derive(Clone, Debug, Default)]
pub struct KeyValueShard {
    entries: BTreeMap<Identifier, Vec<u8>>,
}

impl KeyValueShard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: Identifier) -> Option<&Vec<u8>> {
        self.entries.get(&key)
    }

    /// Store `value`, replacing and returning any previous value.
    pub fn put(&mut self, key: Identifier, value: Vec<u8>) -> Option<Vec<u8>> {
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: Identifier) -> Option<Vec<u8>> {
        self.entries.remove(&key)
    }

    pub fn contains(&self, key: Identifier) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = Identifier> + '_ {
        self.entries.keys().copied()
    }

    /// Remove and return every entry whose key lies in the ring interval
    /// `(lo, hi]`, in ascending identifier order.
    pub fn take_range(
        &mut self,
        space: &IdentifierSpace,
        lo: Identifier,
        hi: Identifier,
    ) -> Vec<(Identifier, Vec<u8>)> {
        let moving: Vec<Identifier> = self
            .entries
            .keys()
            .copied()
            .filter(|key| space.in_interval(*key, lo, hi, false, true))
            .collect();
        moving
            .into_iter()
            .filter_map(|key| self.entries.remove(&key).map(|value| (key, value)))
            .collect()
    }

    /// Take ownership of migrated entries. Incoming values win.
    pub fn absorb(&mut self, entries: impl IntoIterator<Item = (Identifier, Vec<u8>)>) {
        self.entries.extend(entries);
    }
}
