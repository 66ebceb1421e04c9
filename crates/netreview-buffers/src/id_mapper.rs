//! Dense zero-based index assignment for one encoding pass.

use std::hash::Hash;

use ahash::AHashMap;

/// Bijection between caller ids and dense indices.
///
/// The forward map only lives as long as the encoder that owns it;
/// `into_lookup` keeps the reverse table and drops the rest.
#[derive(Debug, Clone)]
pub struct IdMapper<Id> {
    forward: AHashMap<Id, u32>,
    lookup: Vec<Id>,
}

impl<Id: Copy + Eq + Hash> IdMapper<Id> {
    pub fn new() -> Self {
        Self {
            forward: AHashMap::new(),
            lookup: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            forward: AHashMap::with_capacity(capacity),
            lookup: Vec::with_capacity(capacity),
        }
    }

    /// Returns the existing index for `id` or assigns the next one.
    pub fn get_or_assign_idx(&mut self, id: Id) -> u32 {
        if let Some(&idx) = self.forward.get(&id) {
            return idx;
        }
        let idx = u32::try_from(self.lookup.len()).unwrap_or(u32::MAX);
        assert!(idx != u32::MAX, "dense index space exhausted");
        self.forward.insert(id, idx);
        self.lookup.push(id);
        idx
    }

    pub fn get_idx(&self, id: &Id) -> Option<u32> {
        self.forward.get(id).copied()
    }

    pub fn get_id(&self, idx: u32) -> Option<Id> {
        self.lookup.get(idx as usize).copied()
    }

    pub fn count(&self) -> usize {
        self.lookup.len()
    }

    /// Ordered ids, position = dense index.
    pub fn ids(&self) -> &[Id] {
        &self.lookup
    }

    pub fn into_lookup(self) -> Vec<Id> {
        self.lookup
    }
}

impl<Id: Copy + Eq + Hash> Default for IdMapper<Id> {
    fn default() -> Self {
        Self::new()
    }
}
