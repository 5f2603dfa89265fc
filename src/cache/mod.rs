//! Cache Module
//!
//! Key-value caching over pluggable backends with TTL expiration, batch
//! operations and deferred writes.

mod backend;
mod batch;
mod clock;
mod deferred;
mod entry;
mod expiry;
mod item;
mod key;
mod stats;
mod store;


// Re-export public types
pub use backend::{Backend, FileBackend, MemoryBackend, RemoteBackend, StorageResult};
pub use batch::{BatchReport, MultiGet};
pub use clock::{Clock, ManualClock, SystemClock};
pub use deferred::DeferredBuffer;
pub use entry::CacheEntry;
pub use expiry::{Expiry, Ttl};
pub use item::CacheItem;
pub use key::{KeyValidator, RESERVED_CHARACTERS};
pub use stats::CacheStats;
pub use store::Cache;

// == Public Constants ==
/// Default maximum key length in bytes
pub const MAX_KEY_LENGTH: usize = 255;
