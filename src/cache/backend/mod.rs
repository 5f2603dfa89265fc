//! Storage Backends
//!
//! The only layer that performs I/O. Every backend applies the same lazy
//! expiration rule: an expired entry is evicted when it is looked up and
//! is never handed back to the caller.
//!
//! # Variants
//! - [`MemoryBackend`]: process-local map, guarded by a mutex
//! - [`FileBackend`]: one JSON file per key in a directory
//! - [`RemoteBackend`]: HTTP client for a `cachette-server` instance

mod file;
mod memory;
mod remote;

use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::cache::CacheEntry;
use crate::error::StorageError;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use remote::RemoteBackend;

/// Result type for backend operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// == Backend Trait ==
/// Durable key to entry storage.
///
/// `now` is supplied by the caller's clock so that lazy expiration follows
/// the same time source as the expiry computation.
pub trait Backend: Send + Sync + Debug {
    /// Returns the entry if present and unexpired. Expired entries are
    /// removed before returning `None`.
    fn read(&self, key: &str, now: DateTime<Utc>) -> StorageResult<Option<CacheEntry>>;

    /// Inserts or fully replaces the entry for `entry.key`.
    fn write(&self, entry: CacheEntry) -> StorageResult<()>;

    /// Removes a key. Absent keys are not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Removes every entry owned by this backend instance.
    fn remove_all(&self) -> StorageResult<()>;

    /// Same answer as `read(key, now).is_some()`, including the eviction.
    fn exists(&self, key: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        Ok(self.read(key, now)?.is_some())
    }

    /// Sweeps out every expired entry, returning how many were removed.
    fn purge_expired(&self, _now: DateTime<Utc>) -> StorageResult<usize> {
        Ok(0)
    }
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn read(&self, key: &str, now: DateTime<Utc>) -> StorageResult<Option<CacheEntry>> {
        (**self).read(key, now)
    }

    fn write(&self, entry: CacheEntry) -> StorageResult<()> {
        (**self).write(entry)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn remove_all(&self) -> StorageResult<()> {
        (**self).remove_all()
    }

    fn exists(&self, key: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        (**self).exists(key, now)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        (**self).purge_expired(now)
    }
}
