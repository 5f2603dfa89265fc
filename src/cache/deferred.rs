//! Deferred Write Buffer Module
//!
//! Holds staged items until the owning cache commits them.

use std::collections::HashMap;

use crate::cache::CacheItem;

// == Deferred Buffer ==
/// Pending items keyed by cache key. A later stage of the same key replaces
/// the earlier one.
#[derive(Debug, Default)]
pub struct DeferredBuffer {
    pending: HashMap<String, CacheItem>,
}

impl DeferredBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an item, replacing any pending item for the same key.
    pub fn stage(&mut self, item: CacheItem) {
        self.pending.insert(item.key().to_string(), item);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&CacheItem> {
        self.pending.get(key)
    }

    pub fn items(&self) -> impl Iterator<Item = &CacheItem> {
        self.pending.values()
    }

    /// Drops the pending item for `key`, typically after it was written.
    pub fn discard(&mut self, key: &str) -> Option<CacheItem> {
        self.pending.remove(key)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
