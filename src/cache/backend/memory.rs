//! In-memory backend.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use super::{Backend, StorageResult};
use crate::cache::CacheEntry;

// == Memory Backend ==
/// Process-local storage.
///
/// A single mutex covers the map, so the read-check-evict sequence of a
/// lookup can never interleave with a concurrent write to the same key.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Backend for MemoryBackend {
    fn read(&self, key: &str, now: DateTime<Utc>) -> StorageResult<Option<CacheEntry>> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return Ok(None),
        };

        if expired {
            entries.remove(key);
            debug!(key, "evicted expired entry");
            return Ok(None);
        }
        Ok(entries.get(key).cloned())
    }

    fn write(&self, entry: CacheEntry) -> StorageResult<()> {
        self.entries.lock().insert(entry.key.clone(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn remove_all(&self) -> StorageResult<()> {
        self.entries.lock().clear();
        Ok(())
    }

    fn exists(&self, key: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return Ok(false),
        };

        if expired {
            entries.remove(key);
        }
        Ok(!expired)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - entries.len())
    }
}
