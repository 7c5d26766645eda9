// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential persistence: one JSON record per scope set, atomic writes.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::credential::{CredentialRecord, ScopeSetId};

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The persisted bytes exist but cannot be read back as a record.
    #[error("credential record for {scope_set} is unreadable: {reason}")]
    Corrupt { scope_set: ScopeSetId, reason: String },
    #[error("credential store I/O failed for {scope_set}: {source}")]
    Io {
        scope_set: ScopeSetId,
        #[source]
        source: std::io::Error,
    },
}

/// Durable key-value persistence of credential records, keyed by scope set.
///
/// Implementations carry no policy: the broker decides what to do with a
/// missing or corrupt record.
pub trait CredentialStore: Send + Sync {
    /// Load the record for `id`. `Ok(None)` when nothing has been saved yet.
    fn load(&self, id: &ScopeSetId) -> Result<Option<CredentialRecord>, StoreError>;

    /// Replace the record for `id`. The previous record stays authoritative
    /// until the new one is fully durable.
    fn save(&self, id: &ScopeSetId, record: &CredentialRecord) -> Result<(), StoreError>;
}

/// File-backed store: `<dir>/<scope_set_id>.json`.
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "credential store opened");
        Ok(Self { dir })
    }

    fn record_path(&self, id: &ScopeSetId) -> PathBuf {
        // Scope set ids are restricted to [A-Za-z0-9_-], so they are safe file stems.
        self.dir.join(format!("{}.json", id.as_str()))
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, id: &ScopeSetId) -> Result<Option<CredentialRecord>, StoreError> {
        let path = self.record_path(id);
        let contents = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Corrupt { scope_set: id.clone(), reason: e.to_string() })
            }
        };
        let record: CredentialRecord = serde_json::from_slice(&contents)
            .map_err(|e| StoreError::Corrupt { scope_set: id.clone(), reason: e.to_string() })?;
        if &record.scope_set_id != id {
            return Err(StoreError::Corrupt {
                scope_set: id.clone(),
                reason: format!("file holds a record for {}", record.scope_set_id),
            });
        }
        Ok(Some(record))
    }

    fn save(&self, id: &ScopeSetId, record: &CredentialRecord) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io { scope_set: id.clone(), source };
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| io_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        write_atomic(&self.record_path(id), &json).map_err(io_err)
    }
}

/// Write `bytes` to `path` via a unique temp file + fsync + rename, then fsync
/// the parent directory so the rename itself survives a crash.
///
/// The temp name includes the PID and a counter so concurrent writers never
/// share a temp file.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        ".{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);

    let result = (|| {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)
    })();
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result?;
    sync_parent_dir(path)
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::File::open(dir)?.sync_all(),
        _ => Ok(()),
    }
}

// Directory handles cannot be fsynced here; rename is the durability point.
#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
