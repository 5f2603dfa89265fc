//! Cache Entry Module
//!
//! Defines the unit a backend stores: a key, its value and when it expires.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::cache::Expiry;

// == Cache Entry ==
/// Represents a single stored entry.
///
/// Entries are never patched in place: writing a key replaces value and
/// expiry together.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The key this entry is stored under
    pub key: String,
    /// The stored value; `Value::Null` is a real value, not a miss
    pub value: Value,
    /// When the entry stops being readable
    pub expiry: Expiry,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry.
    pub fn new(key: impl Into<String>, value: Value, expiry: Expiry) -> Self {
        Self {
            key: key.into(),
            value,
            expiry,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_expired(now)
    }

    // == Time To Live ==
    /// Returns remaining TTL in whole seconds, or None if no expiration is set.
    pub fn ttl_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expiry.remaining(now).map(|d| d.num_seconds())
    }
}
