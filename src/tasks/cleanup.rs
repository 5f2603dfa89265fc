//! TTL Cleanup Task
//!
//! Background task that periodically purges expired entries from the
//! server's backend. Reads already treat expired entries as misses; the
//! sweep only reclaims their space.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{Backend, Clock};

/// Spawns a background task that purges expired entries every
/// `cleanup_interval_secs` seconds.
///
/// Purging runs on the blocking pool since backends may touch the disk.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
/// let cleanup_handle = spawn_cleanup_task(backend, Arc::new(SystemClock), 60);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let backend = backend.clone();
            let now = clock.now();
            let purged = tokio::task::spawn_blocking(move || backend.purge_expired(now)).await;

            match purged {
                Ok(Ok(0)) => debug!("TTL cleanup: no expired entries found"),
                Ok(Ok(removed)) => info!("TTL cleanup: removed {} expired entries", removed),
                Ok(Err(e)) => warn!(error = %e, "TTL cleanup failed"),
                Err(e) => warn!(error = %e, "TTL cleanup task panicked"),
            }
        }
    })
}
