//! Test fixtures for synchronization integration tests.
//!
//! Provides a disposable two-tier vault, a remote provider whose
//! availability tests can flip at will, and a canned activity directory,
//! so every test builds the same world the same way.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use certvault_sync::test_fixtures::{FakeRemoteProvider, StaticDirectory, TestVault};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let vault = TestVault::with_remote();
//!     let provider = vault.provider();
//!     let orchestrator = vault.orchestrator(provider.clone(), StaticDirectory::new());
//!
//!     provider.set_available(false);
//!     // Run your tests...
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

use certvault_core::defaults::CERTIFICATES_DIR;
use certvault_core::models::{CertificateMetadata, DocumentLocation, MediaKind, StorageTier};
use certvault_core::traits::ActivityDirectory;
use certvault_core::Result;
use certvault_store::{container, StorageLayout};

use crate::config::SyncConfig;
use crate::discovery::{RemoteProvider, SyncedDriveProvider};
use crate::orchestrator::SyncOrchestrator;

/// A disposable vault with a local root and a remote drive root side by
/// side. The backing directory is deleted when the vault drops.
pub struct TestVault {
    root: TempDir,
    pub config: SyncConfig,
}

impl TestVault {
    /// Vault with local storage only, no drive configured.
    pub fn local_only() -> Self {
        let root = TempDir::new().expect("create temp vault");
        let config = SyncConfig::default().with_local_root(root.path().join("local"));
        Self { root, config }
    }

    /// Vault with a mounted drive next to local storage.
    pub fn with_remote() -> Self {
        let root = TempDir::new().expect("create temp vault");
        let drive = root.path().join("drive");
        std::fs::create_dir_all(&drive).expect("create drive mount");
        let config = SyncConfig::default()
            .with_local_root(root.path().join("local"))
            .with_remote_root(Some(drive));
        Self { root, config }
    }

    pub fn layout(&self) -> StorageLayout {
        self.config.layout()
    }

    pub fn local_certificates_root(&self) -> PathBuf {
        self.layout().local_certificates_root()
    }

    pub fn remote_certificates_root(&self) -> PathBuf {
        self.root.path().join("drive").join(CERTIFICATES_DIR)
    }

    pub fn index_path(&self, tier: StorageTier) -> Option<PathBuf> {
        self.layout().index_path(tier)
    }

    /// A provider over this vault's drive, available while the drive
    /// directory exists and the flag is on.
    pub fn provider(&self) -> Arc<FakeRemoteProvider> {
        Arc::new(FakeRemoteProvider::new(self.root.path().join("drive")))
    }

    /// An orchestrator over this vault. The caller keeps the provider
    /// handle to flip availability mid-test.
    pub fn orchestrator(
        &self,
        provider: Arc<FakeRemoteProvider>,
        directory: StaticDirectory,
    ) -> Arc<SyncOrchestrator> {
        Arc::new(SyncOrchestrator::new(
            self.config.clone(),
            provider,
            Arc::new(directory),
        ))
    }

    /// Write a complete container on the given tier and return its record
    /// location. `folder` nests it one activity folder deep.
    pub async fn put_container(
        &self,
        tier: StorageTier,
        folder: Option<&str>,
        stem: &str,
        assigned_object_id: Uuid,
        media_kind: MediaKind,
        payload: &[u8],
    ) -> DocumentLocation {
        let root = match tier {
            StorageTier::Local => self.local_certificates_root(),
            StorageTier::Remote => self.remote_certificates_root(),
        };
        let bundle = format!("{stem}.cert");
        let location = match folder {
            Some(folder) => root.join(folder).join(bundle),
            None => root.join(bundle),
        };
        let metadata = CertificateMetadata::new(tier, assigned_object_id, media_kind);
        container::write(&location, &metadata, payload)
            .await
            .expect("write fixture container");
        DocumentLocation::new(location)
    }
}

/// Strip the payload part out of a container so reads classify it as corrupt.
pub fn damage_payload(location: &Path) {
    std::fs::remove_file(location.join("payload.bin")).expect("remove payload part");
}

/// Replace container metadata with bytes that do not decode.
pub fn damage_metadata(location: &Path) {
    std::fs::write(location.join("metadata.json"), b"{half a record").expect("overwrite metadata");
}

/// Drive-backed provider with a switch for simulating the drive going
/// offline without unmounting anything.
pub struct FakeRemoteProvider {
    inner: SyncedDriveProvider,
    available: AtomicBool,
}

impl FakeRemoteProvider {
    pub fn new(drive_root: impl Into<PathBuf>) -> Self {
        Self {
            inner: SyncedDriveProvider::new(drive_root),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteProvider for FakeRemoteProvider {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst) && self.inner.is_available().await
    }

    async fn enumerate(&self, batches: mpsc::Sender<Vec<PathBuf>>) -> Result<()> {
        self.inner.enumerate(batches).await
    }
}

/// Activity directory answering from a fixed name table.
#[derive(Default)]
pub struct StaticDirectory {
    names: HashMap<Uuid, String>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, assigned_object_id: Uuid, name: impl Into<String>) -> Self {
        self.names.insert(assigned_object_id, name.into());
        self
    }
}

#[async_trait]
impl ActivityDirectory for StaticDirectory {
    async fn activity_name(&self, assigned_object_id: Uuid) -> Option<String> {
        self.names.get(&assigned_object_id).cloned()
    }
}
