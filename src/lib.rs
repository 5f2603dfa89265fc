//! cachette - key-value caching over pluggable backends
//!
//! Provides a [`Cache`] façade with TTL expiration, batch operations and
//! deferred writes on top of memory, file or remote storage, plus the
//! `cachette-server` HTTP front used by the remote backend.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheItem, Ttl};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_cleanup_task;
