//! Cache Façade Module
//!
//! [`Cache`] is the public surface: immediate reads and writes, batch
//! variants, and the deferred item API, all over one backend.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{
    Backend, BatchReport, CacheEntry, CacheItem, CacheStats, Clock, DeferredBuffer, KeyValidator,
    MultiGet, SystemClock, Ttl,
};
use crate::error::{CacheError, Result, SerializationError};

// == Cache ==
/// Key-value cache over a single backend.
///
/// All methods take `&self`; a `Cache` can be shared across threads behind
/// an `Arc`. Two caches never share state unless they share a backend.
#[derive(Debug)]
pub struct Cache {
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    validator: KeyValidator,
    deferred: Mutex<DeferredBuffer>,
    stats: Mutex<CacheStats>,
}

impl Cache {
    // == Constructor ==
    /// Creates a cache over `backend` using the system clock and the default
    /// key rules.
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        Self::from_shared(Arc::new(backend))
    }

    /// Creates a cache over an already shared backend.
    pub fn from_shared(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            validator: KeyValidator::default(),
            deferred: Mutex::new(DeferredBuffer::new()),
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the key rules.
    pub fn with_validator(mut self, validator: KeyValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    // == Get ==
    /// Retrieves and decodes a value. A miss is `Ok(None)`.
    ///
    /// A stored `null` decodes as `Some(..)` when `T` accepts null, so it is
    /// never confused with a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.validator.validate(key)?;
        self.fetch(key)
    }

    /// Like [`Cache::get`], returning `default` on a miss.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    // == Set ==
    /// Stores a value, replacing any previous value and expiry.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: impl Into<Ttl>,
    ) -> Result<()> {
        self.validator.validate(key)?;
        let value = encode(key, value)?;
        self.store(key.to_string(), value, ttl.into())
    }

    // == Delete ==
    /// Removes a key. Deleting an absent key succeeds.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.validator.validate(key)?;
        self.backend.remove(key)?;
        self.stats.lock().record_delete();
        debug!(key, "deleted");
        Ok(())
    }

    // == Clear ==
    /// Removes every entry from the backend and drops pending deferred items.
    pub fn clear(&self) -> Result<()> {
        self.backend.remove_all()?;
        self.deferred.lock().clear();
        debug!("cleared");
        Ok(())
    }

    // == Has ==
    /// Whether `key` holds an unexpired entry. Expired entries are evicted.
    pub fn has(&self, key: &str) -> Result<bool> {
        self.validator.validate(key)?;
        Ok(self.backend.exists(key, self.clock.now())?)
    }

    // == Get Multiple ==
    /// Fetches several keys. Misses get `default`; per-key storage or
    /// decoding failures are reported without aborting the batch.
    ///
    /// Every key is validated before any backend access.
    pub fn get_multiple<T, I, K>(&self, keys: I, default: T) -> Result<MultiGet<T>>
    where
        T: DeserializeOwned + Clone,
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys = self.validated(keys)?;

        let mut result = MultiGet::new();
        for key in keys {
            match self.fetch::<T>(&key) {
                Ok(value) => {
                    result
                        .values
                        .insert(key, value.unwrap_or_else(|| default.clone()));
                }
                Err(err) => result.failed.push((key, err)),
            }
        }
        Ok(result)
    }

    // == Set Multiple ==
    /// Stores several values with the same TTL.
    ///
    /// Every key is validated before any backend access. Values are encoded
    /// up front; one that cannot be encoded is reported as failed and the
    /// rest are still written.
    pub fn set_multiple<I, K, V>(&self, entries: I, ttl: impl Into<Ttl>) -> Result<BatchReport>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize,
    {
        let entries: Vec<(String, V)> = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.validator
            .validate_all(entries.iter().map(|(k, _)| k.as_str()))?;

        let encoded: Vec<(String, Result<Value>)> = entries
            .into_iter()
            .map(|(key, value)| {
                let value = encode(&key, &value);
                (key, value)
            })
            .collect();

        let ttl = ttl.into();
        let mut report = BatchReport::new();
        for (key, value) in encoded {
            let outcome = value.and_then(|value| self.store(key.clone(), value, ttl));
            report.record(key, outcome);
        }
        Ok(report)
    }

    // == Delete Multiple ==
    /// Removes several keys, validating all of them first.
    pub fn delete_multiple<I, K>(&self, keys: I) -> Result<BatchReport>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys = self.validated(keys)?;

        let mut report = BatchReport::new();
        for key in keys {
            let outcome = self.backend.remove(&key).map_err(CacheError::from);
            if outcome.is_ok() {
                self.stats.lock().record_delete();
            }
            report.record(key, outcome);
        }
        Ok(report)
    }

    // == Get Item ==
    /// Returns an item reflecting the current hit/miss state. Never writes.
    pub fn get_item(&self, key: &str) -> Result<CacheItem> {
        self.validator.validate(key)?;
        let entry = self.backend.read(key, self.clock.now())?;
        self.stats.lock().record_lookup(entry.is_some());
        Ok(entry.map_or_else(|| CacheItem::miss(key), CacheItem::hit))
    }

    // == Save ==
    /// Writes an item immediately.
    pub fn save(&self, mut item: CacheItem) -> Result<()> {
        item.resolve(self.clock.now());
        self.write(item.to_entry())
    }

    // == Save Deferred ==
    /// Stages an item for the next [`Cache::commit`]. The backend is not
    /// touched. Any TTL set on the item is resolved now.
    pub fn save_deferred(&self, mut item: CacheItem) {
        item.resolve(self.clock.now());
        debug!(key = item.key(), "staged deferred write");
        self.deferred.lock().stage(item);
    }

    /// Number of staged items awaiting commit.
    pub fn pending(&self) -> usize {
        self.deferred.lock().len()
    }

    // == Commit ==
    /// Writes every staged item.
    ///
    /// Items that were written leave the buffer; items that failed stay
    /// staged for the next commit. Not transactional: earlier successes are
    /// not rolled back.
    pub fn commit(&self) -> BatchReport {
        let mut deferred = self.deferred.lock();
        let entries: Vec<CacheEntry> = deferred.items().map(CacheItem::to_entry).collect();

        let mut report = BatchReport::new();
        for entry in entries {
            let key = entry.key.clone();
            let outcome = self.write(entry);
            if outcome.is_ok() {
                deferred.discard(&key);
            }
            report.record(key, outcome);
        }

        if !report.is_success() {
            warn!(
                failed = report.failed.len(),
                succeeded = report.succeeded.len(),
                "deferred commit incomplete, failed items remain staged"
            );
        }
        report
    }

    // == Remember ==
    /// Returns the cached value for `key`, or runs `producer`, caches its
    /// result with `ttl` and returns it.
    pub fn remember<T, F>(&self, key: &str, ttl: impl Into<Ttl>, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }
        let value = producer();
        self.set(key, &value, ttl)?;
        Ok(value)
    }

    // == Stats ==
    /// Returns a snapshot of the activity counters.
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }

    fn validated<I, K>(&self, keys: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        self.validator.validate_all(keys.iter().map(String::as_str))?;
        Ok(keys)
    }

    fn fetch<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let entry = self.backend.read(key, self.clock.now())?;
        self.stats.lock().record_lookup(entry.is_some());

        match entry {
            Some(entry) => serde_json::from_value(entry.value)
                .map(Some)
                .map_err(|e| SerializationError::decode(key, e).into()),
            None => Ok(None),
        }
    }

    fn store(&self, key: String, value: Value, ttl: Ttl) -> Result<()> {
        let expiry = ttl.normalize(self.clock.now());
        self.write(CacheEntry::new(key, value, expiry))
    }

    fn write(&self, entry: CacheEntry) -> Result<()> {
        let key = entry.key.clone();
        self.backend.write(entry)?;
        self.stats.lock().record_write();
        debug!(key, "stored");
        Ok(())
    }
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| SerializationError::encode(key, e).into())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Expiry, FileBackend, ManualClock, MemoryBackend, StorageResult};
    use crate::error::{KeyViolation, StorageError};
    use chrono::{DateTime, TimeZone, Utc};
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn cache() -> (Arc<MemoryBackend>, Arc<ManualClock>, Cache) {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let cache = Cache::new(backend.clone()).with_clock(clock.clone());
        (backend, clock, cache)
    }

    /// Counts every backend call.
    #[derive(Debug, Default)]
    struct SpyBackend {
        inner: MemoryBackend,
        calls: AtomicUsize,
    }

    impl SpyBackend {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn tick(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Backend for SpyBackend {
        fn read(&self, key: &str, now: DateTime<Utc>) -> StorageResult<Option<CacheEntry>> {
            self.tick();
            self.inner.read(key, now)
        }
        fn write(&self, entry: CacheEntry) -> StorageResult<()> {
            self.tick();
            self.inner.write(entry)
        }
        fn remove(&self, key: &str) -> StorageResult<()> {
            self.tick();
            self.inner.remove(key)
        }
        fn remove_all(&self) -> StorageResult<()> {
            self.tick();
            self.inner.remove_all()
        }
        fn exists(&self, key: &str, now: DateTime<Utc>) -> StorageResult<bool> {
            self.tick();
            self.inner.exists(key, now)
        }
    }

    /// Fails writes for a chosen set of keys until healed.
    #[derive(Debug, Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        broken: Mutex<HashSet<String>>,
    }

    impl FlakyBackend {
        fn break_key(&self, key: &str) {
            self.broken.lock().insert(key.to_string());
        }

        fn heal(&self) {
            self.broken.lock().clear();
        }

        fn failure(key: &str) -> StorageError {
            StorageError::io(
                format!("/flaky/{key}"),
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            )
        }
    }

    impl Backend for FlakyBackend {
        fn read(&self, key: &str, now: DateTime<Utc>) -> StorageResult<Option<CacheEntry>> {
            if self.broken.lock().contains(key) {
                return Err(Self::failure(key));
            }
            self.inner.read(key, now)
        }
        fn write(&self, entry: CacheEntry) -> StorageResult<()> {
            if self.broken.lock().contains(&entry.key) {
                return Err(Self::failure(&entry.key));
            }
            self.inner.write(entry)
        }
        fn remove(&self, key: &str) -> StorageResult<()> {
            self.inner.remove(key)
        }
        fn remove_all(&self) -> StorageResult<()> {
            self.inner.remove_all()
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
    }

    #[test]
    fn test_set_and_get() {
        let (_, _, cache) = cache();
        cache.set("key1", "value1", Ttl::Never).unwrap();

        let value: Option<String> = cache.get("key1").unwrap();
        assert_eq!(value.as_deref(), Some("value1"));
    }

    #[test]
    fn test_get_missing_returns_none_and_default() {
        let (_, _, cache) = cache();
        assert_eq!(cache.get::<i32>("missing").unwrap(), None);
        assert_eq!(cache.get_or("missing", 42).unwrap(), 42);
    }

    #[test]
    fn test_stored_null_is_not_a_miss() {
        let (_, _, cache) = cache();
        cache.set("nothing", &Value::Null, Ttl::Never).unwrap();

        assert_eq!(cache.get::<Value>("nothing").unwrap(), Some(Value::Null));
        assert_eq!(cache.get::<Option<i32>>("nothing").unwrap(), Some(None));
        assert!(cache.has("nothing").unwrap());
        assert_eq!(cache.get::<Value>("absent").unwrap(), None);
    }

    #[test]
    fn test_overwrite_replaces_value_and_expiry() {
        let (backend, clock, cache) = cache();
        cache.set("k", &1, 10).unwrap();
        cache.set("k", &2, Ttl::Never).unwrap();

        clock.advance(3600);
        assert_eq!(cache.get::<i32>("k").unwrap(), Some(2));
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_user_scenario_expires_at_ttl_boundary() {
        let (_, clock, cache) = cache();
        let alice = User {
            name: "Alice".to_string(),
        };
        cache.set("user_42", &alice, 3600).unwrap();

        clock.advance(3599);
        assert_eq!(cache.get::<User>("user_42").unwrap(), Some(alice));

        clock.advance(1);
        assert_eq!(cache.get::<User>("user_42").unwrap(), None);
        assert_eq!(cache.get_or("user_42", Value::Null).unwrap(), Value::Null);
        assert!(!cache.has("user_42").unwrap());
    }

    fn file_cache(start: DateTime<Utc>) -> (tempfile::TempDir, Arc<ManualClock>, Cache) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let cache = Cache::new(FileBackend::new(dir.path())).with_clock(clock.clone());
        (dir, clock, cache)
    }

    #[test]
    fn test_file_backed_user_scenario() {
        let (_dir, clock, cache) = file_cache(t0());
        let alice = User {
            name: "Alice".to_string(),
        };
        cache.set("user_42", &alice, 3600).unwrap();

        clock.advance(3599);
        assert_eq!(cache.get::<User>("user_42").unwrap(), Some(alice));

        clock.advance(1);
        assert_eq!(cache.get::<User>("user_42").unwrap(), None);
        assert!(!cache.has("user_42").unwrap());
    }

    #[test]
    fn test_file_backed_non_positive_ttl() {
        let (_dir, _, cache) = file_cache(t0());
        cache.set("zero", &1, 0).unwrap();
        cache.set("negative", &1, -5).unwrap();

        assert_eq!(cache.get::<i32>("zero").unwrap(), None);
        assert!(!cache.has("negative").unwrap());
    }

    #[test]
    fn test_sub_millisecond_expiry_matches_across_backends() {
        let start = t0() + chrono::Duration::microseconds(500);
        let at = t0() + chrono::Duration::microseconds(800);

        let memory = Cache::new(MemoryBackend::new()).with_clock(Arc::new(ManualClock::new(start)));
        let (_dir, file_clock, file) = file_cache(start);
        memory.set("k", &1, at).unwrap();
        file.set("k", &1, at).unwrap();

        assert_eq!(memory.get::<i32>("k").unwrap(), Some(1));
        assert_eq!(file.get::<i32>("k").unwrap(), Some(1));

        file_clock.set(at);
        assert_eq!(file.get::<i32>("k").unwrap(), None);
    }

    #[test]
    fn test_non_positive_ttl_is_immediately_expired() {
        let (backend, _, cache) = cache();
        cache.set("zero", &1, 0).unwrap();
        cache.set("negative", &1, -5).unwrap();
        assert_eq!(backend.len(), 2);

        assert_eq!(cache.get::<i32>("zero").unwrap(), None);
        assert!(!cache.has("negative").unwrap());
        assert!(backend.is_empty());
    }

    #[test]
    fn test_duration_and_absolute_ttl() {
        let (_, clock, cache) = cache();
        cache
            .set("d", &1, std::time::Duration::from_secs(30))
            .unwrap();
        cache
            .set("at", &1, t0() + chrono::Duration::seconds(10))
            .unwrap();

        clock.advance(10);
        assert!(cache.has("d").unwrap());
        assert!(!cache.has("at").unwrap());
        clock.advance(20);
        assert!(!cache.has("d").unwrap());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_, _, cache) = cache();
        cache.set("k", &1, Ttl::Never).unwrap();
        assert!(cache.delete("k").is_ok());
        assert!(cache.delete("k").is_ok());
        assert!(cache.delete("k").is_ok());
        assert!(!cache.has("k").unwrap());
    }

    #[test]
    fn test_clear_wipes_backend_and_pending_items() {
        let (backend, _, cache) = cache();
        cache.set("a", &1, Ttl::Never).unwrap();
        let mut item = cache.get_item("b").unwrap();
        item.set_value(&2).unwrap();
        cache.save_deferred(item);

        cache.clear().unwrap();

        assert!(backend.is_empty());
        assert_eq!(cache.pending(), 0);
        assert!(cache.commit().succeeded.is_empty());
    }

    #[test]
    fn test_invalid_keys_never_reach_backend() {
        let spy = Arc::new(SpyBackend::default());
        let cache = Cache::new(spy.clone());

        let err = cache.set("bad key!", &1, Ttl::Never).unwrap_err();
        assert!(matches!(
            err,
            CacheError::InvalidKey(ref e) if e.violation == KeyViolation::UnsupportedCharacter(' ')
        ));
        let err = cache.set("a@b", &1, Ttl::Never).unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey(_)));

        assert!(cache.get::<i32>("x{y}").is_err());
        assert!(cache.has("a/b").is_err());
        assert!(cache.delete("a\\b").is_err());
        assert!(cache.get_item("(k)").is_err());
        assert!(cache.get_multiple(["ok", "a:b"], 0).is_err());
        assert!(cache.set_multiple([("ok", 1), ("@", 2)], Ttl::Never).is_err());
        assert!(cache.delete_multiple(["ok", ""]).is_err());

        assert_eq!(spy.calls(), 0);
        assert!(spy.inner.is_empty());
    }

    #[test]
    fn test_get_multiple_fills_defaults() {
        let (_, _, cache) = cache();
        cache.set("b", "value", Ttl::Never).unwrap();

        let result = cache
            .get_multiple(["a", "b", "c"], "default".to_string())
            .unwrap();

        assert!(result.is_complete());
        let values: BTreeMap<_, _> = result.values.into_iter().collect();
        assert_eq!(
            values,
            BTreeMap::from([
                ("a".to_string(), "default".to_string()),
                ("b".to_string(), "value".to_string()),
                ("c".to_string(), "default".to_string()),
            ])
        );
    }

    #[test]
    fn test_get_multiple_reports_per_key_failures() {
        let backend = Arc::new(FlakyBackend::default());
        let cache = Cache::new(backend.clone());
        cache.set("a", &1, Ttl::Never).unwrap();
        cache.set("b", &2, Ttl::Never).unwrap();
        backend.break_key("b");

        let result = cache.get_multiple(["a", "b", "c"], 0).unwrap();

        assert_eq!(result.get("a"), Some(&1));
        assert_eq!(result.get("b"), None);
        assert_eq!(result.get("c"), Some(&0));
        assert_eq!(result.failed.len(), 1);
        assert!(matches!(result.failed[0].1, CacheError::Storage(_)));
    }

    #[test]
    fn test_get_reports_decode_failure() {
        let (_, _, cache) = cache();
        cache.set("k", "not a number", Ttl::Never).unwrap();

        let err = cache.get::<u32>("k").unwrap_err();
        assert!(matches!(err, CacheError::Serialization(ref e) if e.key == "k"));
    }

    #[test]
    fn test_storage_errors_are_not_misses() {
        let backend = Arc::new(FlakyBackend::default());
        let cache = Cache::new(backend.clone());
        backend.break_key("k");

        assert!(matches!(cache.get::<i32>("k"), Err(CacheError::Storage(_))));
        assert!(matches!(
            cache.set("k", &1, Ttl::Never),
            Err(CacheError::Storage(_))
        ));
    }

    #[test]
    fn test_set_multiple_applies_shared_ttl() {
        let (_, clock, cache) = cache();
        let report = cache.set_multiple([("a", 1), ("b", 2)], 60).unwrap();
        assert!(report.is_success());
        assert_eq!(report.succeeded.len(), 2);

        clock.advance(59);
        assert_eq!(cache.get::<i32>("a").unwrap(), Some(1));
        assert_eq!(cache.get::<i32>("b").unwrap(), Some(2));
        clock.advance(1);
        assert!(!cache.has("a").unwrap());
        assert!(!cache.has("b").unwrap());
    }

    #[test]
    fn test_set_multiple_continues_past_failures() {
        let backend = Arc::new(FlakyBackend::default());
        let cache = Cache::new(backend.clone());
        backend.break_key("b");

        let report = cache
            .set_multiple([("a", 1), ("b", 2), ("c", 3)], Ttl::Never)
            .unwrap();

        assert_eq!(report.failed_keys().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(report.succeeded, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_set_multiple_reports_unencodable_value() {
        let (_, _, cache) = cache();
        let bad: BTreeMap<Vec<u8>, i32> = BTreeMap::from([(vec![1], 1)]);
        let good: BTreeMap<Vec<u8>, i32> = BTreeMap::new();

        let report = cache
            .set_multiple([("bad", bad), ("good", good)], Ttl::Never)
            .unwrap();

        assert_eq!(report.succeeded, vec!["good".to_string()]);
        assert!(matches!(report.failed[0].1, CacheError::Serialization(_)));
    }

    #[test]
    fn test_delete_multiple() {
        let (backend, _, cache) = cache();
        cache.set_multiple([("a", 1), ("b", 2), ("c", 3)], Ttl::Never).unwrap();

        let report = cache.delete_multiple(["a", "b", "missing"]).unwrap();

        assert!(report.is_success());
        assert_eq!(report.succeeded.len(), 3);
        assert_eq!(backend.len(), 1);
        assert!(cache.has("c").unwrap());
    }

    #[test]
    fn test_get_item_reflects_hit_state() {
        let (_, _, cache) = cache();
        cache.set("k", &5, Ttl::Never).unwrap();

        let hit = cache.get_item("k").unwrap();
        assert!(hit.is_hit());
        assert_eq!(hit.value::<i32>().unwrap(), Some(5));

        let miss = cache.get_item("other").unwrap();
        assert!(!miss.is_hit());
        assert_eq!(miss.value::<i32>().unwrap(), None);
        assert!(!cache.has("other").unwrap());
    }

    #[test]
    fn test_deferred_write_invisible_until_commit() {
        let (_, _, cache) = cache();
        let mut item = cache.get_item("k").unwrap();
        item.set_value("staged").unwrap();
        cache.save_deferred(item);

        assert_eq!(cache.get::<String>("k").unwrap(), None);
        assert_eq!(cache.pending(), 1);

        let report = cache.commit();
        assert!(report.is_success());
        assert_eq!(cache.pending(), 0);
        assert_eq!(cache.get::<String>("k").unwrap().as_deref(), Some("staged"));
    }

    #[test]
    fn test_deferred_last_write_wins() {
        let (_, _, cache) = cache();
        for n in 1..=3 {
            let mut item = cache.get_item("k").unwrap();
            item.set_value(&n).unwrap();
            cache.save_deferred(item);
        }

        assert_eq!(cache.pending(), 1);
        cache.commit();
        assert_eq!(cache.get::<i32>("k").unwrap(), Some(3));
    }

    #[test]
    fn test_deferred_ttl_resolved_at_staging() {
        let (_, clock, cache) = cache();
        let mut item = cache.get_item("k").unwrap();
        item.set_value(&1).unwrap().expires_after(60);
        cache.save_deferred(item);

        clock.advance(30);
        cache.commit();

        clock.advance(29);
        assert!(cache.has("k").unwrap());
        clock.advance(1);
        assert!(!cache.has("k").unwrap());
    }

    #[test]
    fn test_failed_commit_keeps_items_staged() {
        let backend = Arc::new(FlakyBackend::default());
        let cache = Cache::new(backend.clone());

        for key in ["a", "b"] {
            let mut item = cache.get_item(key).unwrap();
            item.set_value(key).unwrap();
            cache.save_deferred(item);
        }
        backend.break_key("b");

        let report = cache.commit();
        assert_eq!(report.succeeded, vec!["a".to_string()]);
        assert_eq!(report.failed_keys().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(cache.pending(), 1);
        assert_eq!(cache.get::<String>("a").unwrap().as_deref(), Some("a"));

        backend.heal();
        let report = cache.commit();
        assert_eq!(report.succeeded, vec!["b".to_string()]);
        assert_eq!(cache.pending(), 0);
        assert_eq!(cache.get::<String>("b").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_save_writes_immediately() {
        let (_, clock, cache) = cache();
        let mut item = cache.get_item("k").unwrap();
        item.set_value(&9).unwrap().expires_after(5);
        cache.save(item).unwrap();

        assert_eq!(cache.get::<i32>("k").unwrap(), Some(9));
        clock.advance(5);
        assert_eq!(cache.get::<i32>("k").unwrap(), None);
    }

    #[test]
    fn test_saving_hit_item_keeps_expiry() {
        let (_, clock, cache) = cache();
        cache.set("k", &1, 100).unwrap();

        let mut item = cache.get_item("k").unwrap();
        item.set_value(&2).unwrap();
        cache.save(item).unwrap();

        clock.advance(100);
        assert!(!cache.has("k").unwrap());
    }

    #[test]
    fn test_remember_runs_producer_once() {
        let (_, _, cache) = cache();
        let calls = AtomicUsize::new(0);
        let produce = || {
            calls.fetch_add(1, Ordering::SeqCst);
            "computed".to_string()
        };

        assert_eq!(cache.remember("k", 60, produce).unwrap(), "computed");
        assert_eq!(cache.remember("k", 60, produce).unwrap(), "computed");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stats_track_activity() {
        let (_, _, cache) = cache();
        cache.set("k", &1, Ttl::Never).unwrap();
        let _ = cache.get::<i32>("k").unwrap();
        let _ = cache.get::<i32>("missing").unwrap();
        cache.delete("k").unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.deletes, 1);
    }

    #[test]
    fn test_independent_caches() {
        let first = Cache::new(MemoryBackend::new());
        let second = Cache::new(MemoryBackend::new());
        first.set("k", &1, Ttl::Never).unwrap();

        assert!(second.get::<i32>("k").unwrap().is_none());
        second.clear().unwrap();
        assert_eq!(first.get::<i32>("k").unwrap(), Some(1));
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(Cache::new(MemoryBackend::new()));
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let key = format!("k{n}");
                    cache.set(&key, &n, Ttl::Never).unwrap();
                    cache.get::<i32>(&key).unwrap()
                })
            })
            .collect();

        for (n, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), Some(n as i32));
        }
    }

    #[test]
    fn test_custom_key_length() {
        let cache = Cache::new(MemoryBackend::new()).with_validator(KeyValidator::new(4));
        assert!(cache.set("abcd", &1, Ttl::Never).is_ok());
        assert!(matches!(
            cache.set("abcde", &1, Ttl::Never),
            Err(CacheError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_expired_entry_evicted_on_get() {
        let (backend, _, cache) = cache();
        backend
            .write(CacheEntry::new("k", json!(1), Expiry::At(t0())))
            .unwrap();

        assert_eq!(cache.get::<i32>("k").unwrap(), None);
        assert!(backend.is_empty());
    }
}
