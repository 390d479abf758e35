//! In-memory record index with crash-safe persistence.
//!
//! [`IndexStore`] is the single writer for both record sets: the committed
//! set (records whose containers are known to exist) and the remote-observed
//! set (records reported by discovery but not yet reconciled). All mutation
//! goes through its async methods, which take the one internal lock; no I/O
//! happens while the lock is held.
//!
//! Persistence is a plain JSON array of committed records. [`persist`] writes
//! it with a temp-file-and-rename step so the file on disk is always either
//! the previous snapshot or the new one, and [`load`] treats a missing file
//! as an empty index so first launch needs no special casing.

use std::collections::HashMap;
use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use certvault_core::models::{CertificateRecord, RecordKey};
use certvault_core::{Error, Result};

// ============================================================================
// IndexStore
// ============================================================================

#[derive(Debug, Default)]
struct IndexSets {
    committed: HashMap<RecordKey, CertificateRecord>,
    remote_observed: HashMap<RecordKey, CertificateRecord>,
}

/// Owner of the committed and remote-observed record sets.
#[derive(Debug, Default)]
pub struct IndexStore {
    inner: Mutex<IndexSets>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit one record, returning the record it displaced for the same
    /// `(assigned_object_id, media_kind)` pair, if any.
    pub async fn insert(&self, record: CertificateRecord) -> Option<CertificateRecord> {
        let mut sets = self.inner.lock().await;
        sets.committed.insert(record.key(), record)
    }

    pub async fn remove(&self, key: &RecordKey) -> Option<CertificateRecord> {
        let mut sets = self.inner.lock().await;
        sets.committed.remove(key)
    }

    pub async fn get(&self, key: &RecordKey) -> Option<CertificateRecord> {
        let sets = self.inner.lock().await;
        sets.committed.get(key).cloned()
    }

    /// Swap in a complete new committed set in one step. When two incoming
    /// records claim the same pair, the one with the higher version sequence
    /// wins; on a tie the earlier one is kept.
    pub async fn replace_all(&self, records: Vec<CertificateRecord>) {
        let mut next: HashMap<RecordKey, CertificateRecord> = HashMap::with_capacity(records.len());
        for record in records {
            match next.get(&record.key()) {
                Some(existing) if existing.version.sequence >= record.version.sequence => {
                    debug!(key = %record.key(), "index: dropping lower-sequence duplicate");
                }
                _ => {
                    next.insert(record.key(), record);
                }
            }
        }

        let mut sets = self.inner.lock().await;
        sets.committed = next;
    }

    /// Committed records in a stable order, so persisted snapshots and
    /// anything derived from them diff cleanly across runs.
    pub async fn snapshot(&self) -> Vec<CertificateRecord> {
        let sets = self.inner.lock().await;
        let mut records: Vec<CertificateRecord> = sets.committed.values().cloned().collect();
        records.sort_by_key(|r| (r.metadata.assigned_object_id, r.metadata.media_kind));
        records
    }

    pub async fn len(&self) -> usize {
        let sets = self.inner.lock().await;
        sets.committed.len()
    }

    pub async fn is_empty(&self) -> bool {
        let sets = self.inner.lock().await;
        sets.committed.is_empty()
    }

    /// Whether any record is committed for the given object, regardless of
    /// media kind.
    pub async fn has_any_for(&self, assigned_object_id: uuid::Uuid) -> bool {
        let sets = self.inner.lock().await;
        sets.committed
            .keys()
            .any(|k| k.assigned_object_id == assigned_object_id)
    }

    pub async fn set_remote_observed(&self, records: Vec<CertificateRecord>) {
        let mut sets = self.inner.lock().await;
        sets.remote_observed = records.into_iter().map(|r| (r.key(), r)).collect();
    }

    pub async fn remote_observed_snapshot(&self) -> Vec<CertificateRecord> {
        let sets = self.inner.lock().await;
        let mut records: Vec<CertificateRecord> = sets.remote_observed.values().cloned().collect();
        records.sort_by_key(|r| (r.metadata.assigned_object_id, r.metadata.media_kind));
        records
    }

    pub async fn clear_remote_observed(&self) {
        let mut sets = self.inner.lock().await;
        sets.remote_observed.clear();
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// Write the committed set to `path` as pretty-printed JSON. The snapshot is
/// taken before any I/O starts, and placeholder records are left out since
/// they are rebuilt from disk on every pass anyway.
pub async fn persist(store: &IndexStore, path: &Path) -> Result<()> {
    let records: Vec<CertificateRecord> = store
        .snapshot()
        .await
        .into_iter()
        .filter(|r| !r.metadata.is_placeholder)
        .collect();
    let encoded = serde_json::to_vec_pretty(&records)?;
    debug!(path = %path.display(), records = records.len(), "index: persisting");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            warn!(parent = %parent.display(), error = %e, "index: create_dir_all failed");
            Error::WriteFailed {
                path: parent.to_path_buf(),
                source: e,
            }
        })?;
    }

    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path).await.map_err(|e| {
        warn!(path = %temp_path.display(), error = %e, "index: File::create failed");
        Error::WriteFailed {
            path: temp_path.clone(),
            source: e,
        }
    })?;
    file.write_all(&encoded).await.map_err(|e| {
        warn!(path = %temp_path.display(), error = %e, "index: write_all failed");
        Error::WriteFailed {
            path: temp_path.clone(),
            source: e,
        }
    })?;
    file.sync_all().await.map_err(|e| Error::WriteFailed {
        path: temp_path.clone(),
        source: e,
    })?;
    drop(file);

    fs::rename(&temp_path, path).await.map_err(|e| {
        warn!(from = %temp_path.display(), to = %path.display(), error = %e, "index: rename failed");
        Error::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    // Index is private state but not a secret
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
            .await
            .map_err(|e| Error::WriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    Ok(())
}

/// Load a persisted index. A missing file is an empty index; an unreadable
/// or undecodable file is an error, and the caller decides whether to fall
/// back to rebuilding from disk.
pub async fn load(path: &Path) -> Result<Vec<CertificateRecord>> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "index: no persisted file, starting empty");
        return Ok(Vec::new());
    }

    let raw = fs::read(path).await.map_err(|e| Error::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_slice(&raw).map_err(|e| Error::IndexDecodeFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Move the persisted index file from one tier's root to the other's.
/// Returns `true` when a file was actually moved. Falls back to copy and
/// delete when the two roots sit on different filesystems.
pub async fn relocate_index_file(from: &Path, to: &Path) -> Result<bool> {
    if from == to || !fs::try_exists(from).await.unwrap_or(false) {
        return Ok(false);
    }

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).await.map_err(|e| Error::WriteFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    match fs::rename(from, to).await {
        Ok(()) => Ok(true),
        Err(rename_err) => {
            debug!(
                from = %from.display(),
                to = %to.display(),
                error = %rename_err,
                "index: rename across roots failed, copying"
            );
            fs::copy(from, to).await.map_err(|e| Error::WriteFailed {
                path: to.to_path_buf(),
                source: e,
            })?;
            fs::remove_file(from).await.map_err(|e| Error::WriteFailed {
                path: from.to_path_buf(),
                source: e,
            })?;
            Ok(true)
        }
    }
}
