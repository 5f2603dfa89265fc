//! Remote backend: a blocking HTTP client for `cachette-server`.
//!
//! Every request carries the configured timeout, so a stalled server turns
//! into [`StorageError::Timeout`] instead of a hung caller.
//!
//! The blocking client spins up its own runtime internally; do not call
//! it from inside an async task.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use tracing::debug;

use super::{Backend, StorageResult};
use crate::cache::CacheEntry;
use crate::error::StorageError;
use crate::models::{EntryResponse, ErrorResponse, PutEntryRequest};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

// == Remote Backend ==
/// Stores entries on a remote cache server.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: Client,
    base_url: String,
}

impl RemoteBackend {
    /// Creates a client for the server at `base_url` (e.g.
    /// `http://127.0.0.1:3000`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> StorageResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::http(base_url.clone(), e))?;
        Ok(Self { client, base_url })
    }

    /// [`RemoteBackend::new`] with [`DEFAULT_TIMEOUT`].
    pub fn connect(base_url: impl Into<String>) -> StorageResult<Self> {
        Self::new(base_url, DEFAULT_TIMEOUT)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn entry_url(&self, key: &str) -> String {
        format!("{}/entries/{}", self.base_url, key)
    }

    fn entries_url(&self) -> String {
        format!("{}/entries", self.base_url)
    }

    fn expect_success(url: &str, response: Response) -> StorageResult<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(StorageError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            })
        }
    }
}

impl Backend for RemoteBackend {
    fn read(&self, key: &str, now: DateTime<Utc>) -> StorageResult<Option<CacheEntry>> {
        let url = self.entry_url(key);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| StorageError::http(url.clone(), e))?;

        if response.status() == StatusCode::NOT_FOUND {
            // Any other 404 means the URL does not point at a cache server.
            let miss = response
                .json::<ErrorResponse>()
                .is_ok_and(|body| body.is_key_not_found());
            if miss {
                return Ok(None);
            }
            return Err(StorageError::UnexpectedStatus {
                url,
                status: StatusCode::NOT_FOUND.as_u16(),
            });
        }
        let body: EntryResponse = Self::expect_success(&url, response)?
            .json()
            .map_err(|e| StorageError::http(url.clone(), e))?;

        // The server judges expiry by its own clock; ours has the last word.
        let entry = CacheEntry::from(body);
        if entry.is_expired(now) {
            debug!(key, "remote entry expired by local clock");
            self.remove(key)?;
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn write(&self, entry: CacheEntry) -> StorageResult<()> {
        let url = self.entry_url(&entry.key);
        let body = PutEntryRequest {
            expires_at: entry.expiry.instant(),
            value: entry.value,
        };
        let response = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .map_err(|e| StorageError::http(url.clone(), e))?;
        Self::expect_success(&url, response)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let url = self.entry_url(key);
        let response = self
            .client
            .delete(&url)
            .send()
            .map_err(|e| StorageError::http(url.clone(), e))?;
        Self::expect_success(&url, response)?;
        Ok(())
    }

    fn remove_all(&self) -> StorageResult<()> {
        let url = self.entries_url();
        let response = self
            .client
            .delete(&url)
            .send()
            .map_err(|e| StorageError::http(url.clone(), e))?;
        Self::expect_success(&url, response)?;
        Ok(())
    }
}
