//! File-based backend.
//!
//! One file per key, named `hex(sha256(key)).cache`. Each file holds a JSON
//! record with a format number, the original key, the value and the expiry
//! as an RFC 3339 instant with full sub-second precision.
//!
//! There is no locking: two writers racing on the same key each replace the
//! file whole and the last rename wins. Callers that need stronger guarantees
//! across processes must coordinate externally.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{Backend, StorageResult};
use crate::cache::{CacheEntry, Expiry};
use crate::error::StorageError;

/// Current on-disk record version.
pub const FORMAT_VERSION: u32 = 1;

const EXTENSION: &str = "cache";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    format: u32,
    key: String,
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

/// Only the header, so sweeps and version checks skip decoding values.
#[derive(Debug, Deserialize)]
struct RecordHeader {
    format: u32,
    key: String,
    expires_at: Option<DateTime<Utc>>,
}

// == File Backend ==
/// Stores entries as files under a single directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Creates a backend rooted at `dir`. The directory is created on the
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir
            .join(format!("{}.{}", hex::encode(digest), EXTENSION))
    }

    fn load(&self, path: &Path) -> StorageResult<Option<Record>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(path, e)),
        };

        let header: RecordHeader =
            serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupted {
                path: path.to_path_buf(),
                source,
            })?;
        if header.format != FORMAT_VERSION {
            return Err(StorageError::UnsupportedFormat {
                path: path.to_path_buf(),
                found: header.format,
            });
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Corrupted {
                path: path.to_path_buf(),
                source,
            })
    }

    fn delete_file(path: &Path) -> StorageResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    /// Every `*.cache` file in the directory. A missing directory has none.
    fn cache_files(&self) -> StorageResult<Vec<PathBuf>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.dir, e)),
        };

        let mut files = Vec::new();
        for dir_entry in read_dir {
            let path = dir_entry.map_err(|e| StorageError::io(&self.dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION) && path.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }
}

impl Backend for FileBackend {
    fn read(&self, key: &str, now: DateTime<Utc>) -> StorageResult<Option<CacheEntry>> {
        let path = self.path_for(key);
        let Some(record) = self.load(&path)? else {
            return Ok(None);
        };

        if record.key != key {
            warn!(key, stored = %record.key, path = %path.display(), "cache file hash collision");
            return Ok(None);
        }

        let expiry = Expiry::from(record.expires_at);
        if expiry.is_expired(now) {
            Self::delete_file(&path)?;
            debug!(key, "evicted expired cache file");
            return Ok(None);
        }

        Ok(Some(CacheEntry::new(record.key, record.value, expiry)))
    }

    fn write(&self, entry: CacheEntry) -> StorageResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;

        let path = self.path_for(&entry.key);
        let record = Record {
            format: FORMAT_VERSION,
            expires_at: entry.expiry.instant(),
            key: entry.key,
            value: entry.value,
        };
        let bytes = encode_record(&path, &record)?;

        // Readers only ever see a complete file: write aside, then rename.
        let temp = path.with_extension(format!(
            "tmp.{}.{}",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        write_atomically(&temp, &path, &bytes)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        Self::delete_file(&self.path_for(key))
    }

    fn remove_all(&self) -> StorageResult<()> {
        for path in self.cache_files()? {
            Self::delete_file(&path)?;
        }
        Ok(())
    }

    fn exists(&self, key: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        let header: RecordHeader =
            serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupted {
                path: path.clone(),
                source,
            })?;
        if header.format != FORMAT_VERSION {
            return Err(StorageError::UnsupportedFormat {
                path,
                found: header.format,
            });
        }
        if header.key != key {
            return Ok(false);
        }

        if Expiry::from(header.expires_at).is_expired(now) {
            Self::delete_file(&path)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let mut removed = 0;
        for path in self.cache_files()? {
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::io(&path, e)),
            };
            let header: RecordHeader = match serde_json::from_slice(&bytes) {
                Ok(header) => header,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable cache file");
                    continue;
                }
            };
            if Expiry::from(header.expires_at).is_expired(now) {
                Self::delete_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Writes `bytes` to `temp`, then renames it over `path`. The temp file
/// never outlives a failure.
fn write_atomically(temp: &Path, path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Err(e) = fs::write(temp, bytes) {
        let _ = fs::remove_file(temp);
        return Err(StorageError::io(temp, e));
    }
    if let Err(e) = fs::rename(temp, path) {
        let _ = fs::remove_file(temp);
        return Err(StorageError::io(path, e));
    }
    Ok(())
}

fn encode_record<T: Serialize>(path: &Path, record: &T) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|source| StorageError::Encode {
        path: path.to_path_buf(),
        source,
    })
}
