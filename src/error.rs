//! Error types for the cache
//!
//! Provides unified error handling using thiserror. Misses are never errors:
//! every variant here means the caller did something wrong or the cache is
//! broken.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Key Violation ==
/// The rule a rejected cache key broke.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyViolation {
    #[error("key is empty")]
    Empty,

    #[error("key is {len} bytes, maximum is {max}")]
    TooLong { len: usize, max: usize },

    #[error("key contains reserved character {0:?}")]
    ReservedCharacter(char),

    #[error("key contains unsupported character {0:?}")]
    UnsupportedCharacter(char),

    #[error("key must not be a bare '.' or '..' path segment")]
    DotSegment,
}

// == Invalid Key Error ==
/// A malformed key. Always fixable by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid cache key {key:?}: {violation}")]
pub struct InvalidKeyError {
    /// The offending key
    pub key: String,
    /// Why it was rejected
    pub violation: KeyViolation,
}

// == Storage Error ==
/// A backend failed to perform I/O.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupted cache file {}: {source}", path.display())]
    Corrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode cache record for {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache file {} has unsupported format version {found}", path.display())]
    UnsupportedFormat { path: PathBuf, found: u32 },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Http { url, source }
        }
    }
}

// == Serialization Error ==
/// Direction of a failed serde conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationOp {
    Encode,
    Decode,
}

impl std::fmt::Display for SerializationOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializationOp::Encode => f.write_str("encode"),
            SerializationOp::Decode => f.write_str("decode"),
        }
    }
}

/// A value could not be converted to or from its stored form.
#[derive(Error, Debug)]
#[error("failed to {operation} value for key {key:?}: {source}")]
pub struct SerializationError {
    pub key: String,
    pub operation: SerializationOp,
    #[source]
    pub source: serde_json::Error,
}

impl SerializationError {
    pub(crate) fn encode(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self {
            key: key.into(),
            operation: SerializationOp::Encode,
            source,
        }
    }

    pub(crate) fn decode(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self {
            key: key.into(),
            operation: SerializationOp::Decode,
            source,
        }
    }
}

// == Cache Error Enum ==
/// Unified error type returned by the cache façade.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    InvalidKey(#[from] InvalidKeyError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

// == API Error ==
/// Errors produced by the HTTP handlers of the cache server.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Key not present (or already expired)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<InvalidKeyError> for ApiError {
    fn from(err: InvalidKeyError) -> Self {
        ApiError::Cache(err.into())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Cache(err.into())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Cache(CacheError::InvalidKey(_)) => StatusCode::BAD_REQUEST,
            ApiError::Cache(CacheError::Serialization(_)) => StatusCode::BAD_REQUEST,
            ApiError::Cache(CacheError::Storage(StorageError::Timeout { .. })) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            ApiError::Cache(CacheError::Storage(
                StorageError::Http { .. } | StorageError::UnexpectedStatus { .. },
            )) => StatusCode::BAD_GATEWAY,
            ApiError::Cache(CacheError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

/// Server-side Result type.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
