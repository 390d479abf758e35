//! Remote container discovery.
//!
//! Finding certificates on the synchronized drive is a phased pass: idle
//! until asked, searching while the provider enumerates and containers
//! decode, converged once the full remote set is in hand. [`RemoteDiscovery::reset`]
//! returns the machine to idle so the next pass starts clean.
//!
//! The provider streams locations in batches while this side decodes them,
//! so a large drive never has to be listed fully before decoding starts.
//! Dropping the receiving side stops the provider at its next send.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use certvault_core::defaults::{CERTIFICATES_DIR, DISCOVERY_BATCH_SIZE};
use certvault_core::models::{CertificateRecord, StorageTier};
use certvault_core::{Error, Result};
use certvault_store::{container, StorageLayout};

// ============================================================================
// Provider
// ============================================================================

/// Source of container locations on the synchronized drive.
#[async_trait]
pub trait RemoteProvider: Send + Sync {
    /// Whether the drive is reachable right now.
    async fn is_available(&self) -> bool;

    /// Stream every container location on the drive into `batches`. A send
    /// failure means the consumer is gone, and enumeration should stop
    /// without error.
    async fn enumerate(&self, batches: mpsc::Sender<Vec<PathBuf>>) -> Result<()>;
}

/// Provider backed by a synchronized drive mounted as a plain directory.
///
/// The drive mirrors the local layout: containers sit directly under the
/// certificates root or one activity folder below it.
pub struct SyncedDriveProvider {
    drive_root: PathBuf,
    batch_size: usize,
}

impl SyncedDriveProvider {
    pub fn new(drive_root: impl Into<PathBuf>) -> Self {
        Self {
            drive_root: drive_root.into(),
            batch_size: DISCOVERY_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn certificates_root(&self) -> PathBuf {
        self.drive_root.join(CERTIFICATES_DIR)
    }
}

#[async_trait]
impl RemoteProvider for SyncedDriveProvider {
    async fn is_available(&self) -> bool {
        fs::try_exists(&self.drive_root).await.unwrap_or(false)
    }

    async fn enumerate(&self, batches: mpsc::Sender<Vec<PathBuf>>) -> Result<()> {
        let root = self.certificates_root();
        if !fs::try_exists(&root).await.unwrap_or(false) {
            // Drive is mounted but holds no certificates yet.
            return Ok(());
        }

        let mut batch = Vec::with_capacity(self.batch_size);
        let mut top = fs::read_dir(&root).await.map_err(|e| Error::ReadFailed {
            path: root.clone(),
            source: e,
        })?;

        while let Ok(Some(entry)) = top.next_entry().await {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if StorageLayout::is_container_name(&path) {
                if !push_location(&batches, &mut batch, self.batch_size, path).await {
                    return Ok(());
                }
            } else {
                let mut folder = match fs::read_dir(&path).await {
                    Ok(folder) => folder,
                    Err(e) => {
                        debug!(folder = %path.display(), error = %e, "discovery: skipping unreadable folder");
                        continue;
                    }
                };
                while let Ok(Some(inner)) = folder.next_entry().await {
                    let inner_path = inner.path();
                    if inner_path.is_dir() && StorageLayout::is_container_name(&inner_path) {
                        if !push_location(&batches, &mut batch, self.batch_size, inner_path).await {
                            return Ok(());
                        }
                    }
                }
            }
        }

        if !batch.is_empty() {
            let _ = batches.send(batch).await;
        }
        Ok(())
    }
}

/// Returns `false` once the consumer has gone away.
async fn push_location(
    batches: &mpsc::Sender<Vec<PathBuf>>,
    batch: &mut Vec<PathBuf>,
    batch_size: usize,
    location: PathBuf,
) -> bool {
    batch.push(location);
    if batch.len() >= batch_size {
        let full = std::mem::replace(batch, Vec::with_capacity(batch_size));
        if batches.send(full).await.is_err() {
            return false;
        }
    }
    true
}

// ============================================================================
// Discovery machine
// ============================================================================

/// Where a discovery pass currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    /// No pass running and no results held.
    Idle,
    /// Enumerating and decoding remote containers.
    Searching,
    /// A complete remote set is held until [`RemoteDiscovery::reset`].
    Converged,
}

/// Everything one discovery pass found.
#[derive(Debug, Clone, Default)]
pub struct DiscoverySnapshot {
    /// Records decoded from remote containers, tier normalized to remote.
    pub records: Vec<CertificateRecord>,
    /// Containers that exist on the drive but could not be decoded.
    pub unreadable: usize,
}

/// Drives a [`RemoteProvider`] to convergence and holds the result.
pub struct RemoteDiscovery {
    provider: Arc<dyn RemoteProvider>,
    phase: RwLock<DiscoveryPhase>,
    snapshot: RwLock<Option<DiscoverySnapshot>>,
}

impl RemoteDiscovery {
    pub fn new(provider: Arc<dyn RemoteProvider>) -> Self {
        Self {
            provider,
            phase: RwLock::new(DiscoveryPhase::Idle),
            snapshot: RwLock::new(None),
        }
    }

    pub async fn phase(&self) -> DiscoveryPhase {
        *self.phase.read().await
    }

    /// The held result of the last completed pass, if any.
    pub async fn snapshot(&self) -> Option<DiscoverySnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Run one full pass. On success the machine is converged and the
    /// snapshot is held until [`reset`](Self::reset); on any failure the
    /// machine is back to idle with nothing held.
    pub async fn search(&self) -> Result<DiscoverySnapshot> {
        if !self.provider.is_available().await {
            self.reset().await;
            return Err(Error::DiscoveryUnavailable(
                "synchronized drive is not reachable".to_string(),
            ));
        }

        *self.phase.write().await = DiscoveryPhase::Searching;
        debug!("discovery: searching");

        match self.collect().await {
            Ok(snapshot) => {
                info!(
                    found = snapshot.records.len(),
                    unreadable = snapshot.unreadable,
                    "discovery: converged"
                );
                *self.snapshot.write().await = Some(snapshot.clone());
                *self.phase.write().await = DiscoveryPhase::Converged;
                Ok(snapshot)
            }
            Err(e) => {
                self.reset().await;
                Err(e)
            }
        }
    }

    /// Discard any held result and return to idle.
    pub async fn reset(&self) {
        *self.snapshot.write().await = None;
        *self.phase.write().await = DiscoveryPhase::Idle;
    }

    async fn collect(&self) -> Result<DiscoverySnapshot> {
        let (tx, mut rx) = mpsc::channel::<Vec<PathBuf>>(4);
        let provider = self.provider.clone();
        let enumerator = tokio::spawn(async move { provider.enumerate(tx).await });

        let mut snapshot = DiscoverySnapshot::default();
        while let Some(locations) = rx.recv().await {
            for location in locations {
                match container::reconstruct_record(&location).await {
                    Ok(mut record) => {
                        // The drive is where this container physically is,
                        // whatever its metadata said when written.
                        record.metadata.storage_tier = StorageTier::Remote;
                        snapshot.records.push(record);
                    }
                    Err(e) => {
                        debug!(location = %location.display(), error = %e, "discovery: container unreadable");
                        snapshot.unreadable += 1;
                    }
                }
            }
        }

        match enumerator.await {
            Ok(Ok(())) => Ok(snapshot),
            Ok(Err(e)) => Err(Error::DiscoveryUnavailable(format!(
                "enumeration failed: {e}"
            ))),
            Err(e) => Err(Error::DiscoveryUnavailable(format!(
                "enumeration task failed: {e}"
            ))),
        }
    }
}
