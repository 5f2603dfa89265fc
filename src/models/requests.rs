//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for storing an entry (PUT /entries/:key)
///
/// # Fields
/// - `value`: The value to store, any JSON
/// - `expires_at`: Expiry as an RFC 3339 instant, absent or null for never
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutEntryRequest {
    /// The value to store
    pub value: Value,
    /// Absolute expiry instant
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}
