//! Cache Item Module
//!
//! The value object handed out by [`Cache::get_item`](crate::cache::Cache::get_item)
//! and fed back through `save` or `save_deferred`.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheEntry, Expiry, Ttl};
use crate::error::SerializationError;

// == Cache Item ==
/// A key, its value and its expiry, detached from storage.
///
/// Mutating an item does nothing until it is saved. Dropping it is a no-op.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheItem {
    key: String,
    value: Option<Value>,
    is_hit: bool,
    expiry: Expiry,
    pending_ttl: Option<Ttl>,
}

impl CacheItem {
    pub(crate) fn hit(entry: CacheEntry) -> Self {
        Self {
            key: entry.key,
            value: Some(entry.value),
            is_hit: true,
            expiry: entry.expiry,
            pending_ttl: None,
        }
    }

    pub(crate) fn miss(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            is_hit: false,
            expiry: Expiry::Never,
            pending_ttl: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the key was present when the item was fetched.
    pub fn is_hit(&self) -> bool {
        self.is_hit
    }

    /// The raw stored value, if any.
    pub fn raw_value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Decodes the value. `Ok(None)` on a miss that was never given a value.
    pub fn value<T: DeserializeOwned>(&self) -> Result<Option<T>, SerializationError> {
        self.value
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SerializationError::decode(&self.key, e))
    }

    /// Replaces the value.
    pub fn set_value<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<&mut Self, SerializationError> {
        let value = serde_json::to_value(value).map_err(|e| SerializationError::encode(&self.key, e))?;
        self.value = Some(value);
        Ok(self)
    }

    /// Expires the item `ttl` after it is saved.
    pub fn expires_after(&mut self, ttl: impl Into<Ttl>) -> &mut Self {
        self.pending_ttl = Some(ttl.into());
        self
    }

    /// Expires the item at an absolute instant; `None` means never.
    pub fn expires_at(&mut self, at: Option<DateTime<Utc>>) -> &mut Self {
        self.pending_ttl = Some(at.map_or(Ttl::Never, Ttl::At));
        self
    }

    /// Expiry as last resolved. A pending TTL is resolved on save.
    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    /// Resolves any pending TTL against `now`.
    pub(crate) fn resolve(&mut self, now: DateTime<Utc>) {
        if let Some(ttl) = self.pending_ttl.take() {
            self.expiry = ttl.normalize(now);
        }
    }

    /// The entry this item commits as. Unset values store `null`.
    pub(crate) fn to_entry(&self) -> CacheEntry {
        CacheEntry::new(
            self.key.clone(),
            self.value.clone().unwrap_or(Value::Null),
            self.expiry,
        )
    }
}
