//! API Handlers
//!
//! HTTP request handlers exposing a storage backend. These are the far side
//! of [`RemoteBackend`](crate::cache::RemoteBackend).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use parking_lot::Mutex;

use crate::cache::{
    Backend, CacheEntry, CacheStats, Clock, Expiry, KeyValidator, MemoryBackend, SystemClock,
};
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::models::{AckResponse, EntryResponse, HealthResponse, PutEntryRequest, StatsResponse};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Storage the server fronts
    pub backend: Arc<dyn Backend>,
    /// Time source for lazy expiration
    pub clock: Arc<dyn Clock>,
    /// Key rules applied to every path key
    pub validator: KeyValidator,
    /// Request counters
    pub stats: Arc<Mutex<CacheStats>>,
}

impl AppState {
    /// Creates a new AppState over the given backend.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            validator: KeyValidator::default(),
            stats: Arc::new(Mutex::new(CacheStats::new())),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Self {
        let mut state = Self::new(config.build_backend());
        state.validator = config.key_validator();
        state
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }
}

/// Runs a backend call on the blocking pool.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
}

/// Handler for GET /entries/:key
///
/// Returns the entry, or 404 when absent or expired.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<EntryResponse>> {
    state.validator.validate(&key)?;

    let backend = state.backend.clone();
    let now = state.clock.now();
    let lookup = key.clone();
    let entry = blocking(move || Ok(backend.read(&lookup, now)?)).await?;

    state.stats.lock().record_lookup(entry.is_some());
    entry
        .map(|entry| Json(EntryResponse::from(entry)))
        .ok_or(ApiError::NotFound(key))
}

/// Handler for PUT /entries/:key
///
/// Stores the entry, replacing any previous one.
pub async fn put_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<PutEntryRequest>,
) -> ApiResult<Json<AckResponse>> {
    state.validator.validate(&key)?;

    let backend = state.backend.clone();
    let entry = CacheEntry::new(key.clone(), req.value, Expiry::from(req.expires_at));
    blocking(move || Ok(backend.write(entry)?)).await?;

    state.stats.lock().record_write();
    Ok(Json(AckResponse::stored(key)))
}

/// Handler for DELETE /entries/:key
///
/// Deleting an absent key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<AckResponse>> {
    state.validator.validate(&key)?;

    let backend = state.backend.clone();
    let target = key.clone();
    blocking(move || Ok(backend.remove(&target)?)).await?;

    state.stats.lock().record_delete();
    Ok(Json(AckResponse::deleted(key)))
}

/// Handler for DELETE /entries
///
/// Removes every entry.
pub async fn clear_handler(State(state): State<AppState>) -> ApiResult<Json<AckResponse>> {
    let backend = state.backend.clone();
    blocking(move || Ok(backend.remove_all()?)).await?;

    Ok(Json(AckResponse::cleared()))
}

/// Handler for GET /stats
///
/// Returns current request statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = *state.stats.lock();
    Json(StatsResponse::from(stats))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
