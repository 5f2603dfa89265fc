//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{CacheEntry, CacheStats, Expiry};

/// Response body for reading an entry (GET /entries/:key)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
    /// Absolute expiry as RFC 3339, null for never
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<CacheEntry> for EntryResponse {
    fn from(entry: CacheEntry) -> Self {
        Self {
            expires_at: entry.expiry.instant(),
            key: entry.key,
            value: entry.value,
        }
    }
}

impl From<EntryResponse> for CacheEntry {
    fn from(resp: EntryResponse) -> Self {
        CacheEntry::new(resp.key, resp.value, Expiry::from(resp.expires_at))
    }
}

/// Response body for write and delete operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    /// Success message
    pub message: String,
    /// The key that was affected, absent for a full clear
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl AckResponse {
    /// Acknowledges a stored key
    pub fn stored(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' stored successfully", key),
            key: Some(key),
        }
    }

    /// Acknowledges a removed key
    pub fn deleted(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key: Some(key),
        }
    }

    /// Acknowledges a full clear
    pub fn cleared() -> Self {
        Self {
            message: "Cache cleared".to_string(),
            key: None,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of writes
    pub writes: u64,
    /// Number of deletes
    pub deletes: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            writes: stats.writes,
            deletes: stats.deletes,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// Whether this is the server's answer for an absent or expired key, as
    /// opposed to a 404 from some other route or server.
    pub fn is_key_not_found(&self) -> bool {
        self.error.starts_with("Key not found")
    }
}
