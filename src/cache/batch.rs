//! Batch outcome types.
//!
//! Batch operations never stop at the first failing key; they report what
//! happened to each one.

use std::collections::HashMap;

use crate::error::CacheError;

// == Batch Report ==
/// Per-key outcome of a multi-key write, delete or commit.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Keys that were applied
    pub succeeded: Vec<String>,
    /// Keys that failed, with the reason
    pub failed: Vec<(String, CacheError)>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, key: String, outcome: Result<(), CacheError>) {
        match outcome {
            Ok(()) => self.succeeded.push(key),
            Err(err) => self.failed.push((key, err)),
        }
    }

    /// True when no key failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_keys(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|(key, _)| key.as_str())
    }
}

// == Multi Get ==
/// Result of [`Cache::get_multiple`](crate::cache::Cache::get_multiple).
///
/// Every requested key that did not fail has a value, either the stored one
/// or the default.
#[derive(Debug)]
pub struct MultiGet<T> {
    pub values: HashMap<String, T>,
    pub failed: Vec<(String, CacheError)>,
}

impl<T> MultiGet<T> {
    pub(crate) fn new() -> Self {
        Self {
            values: HashMap::new(),
            failed: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.values.get(key)
    }

    /// True when every key produced a value.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
