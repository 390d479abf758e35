//! Synchronization configuration.

use std::path::PathBuf;
use std::str::FromStr;

use certvault_core::defaults::{
    DISCOVERY_BATCH_SIZE, EVENT_BUS_CAPACITY, MOVE_CONCURRENCY, TRIGGER_CHANNEL_DEPTH,
};
use certvault_core::models::StorageTier;
use certvault_store::StorageLayout;

/// Configuration for the synchronization orchestrator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Root of local storage.
    pub local_root: PathBuf,
    /// Root of the synchronized drive, when one is configured.
    pub remote_root: Option<PathBuf>,
    /// Tier the user wants documents to live on.
    pub preferred_tier: StorageTier,
    /// Containers per discovery batch.
    pub discovery_batch_size: usize,
    /// Broadcast capacity of the event bus.
    pub event_capacity: usize,
    /// Queued sync triggers before senders are pushed back.
    pub trigger_depth: usize,
    /// Concurrent container moves during a preference change.
    pub move_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_root: PathBuf::from("./certvault-data"),
            remote_root: None,
            preferred_tier: StorageTier::Local,
            discovery_batch_size: DISCOVERY_BATCH_SIZE,
            event_capacity: EVENT_BUS_CAPACITY,
            trigger_depth: TRIGGER_CHANNEL_DEPTH,
            move_concurrency: MOVE_CONCURRENCY,
        }
    }
}

impl SyncConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `CERTVAULT_LOCAL_ROOT` | `./certvault-data` | Local storage root |
    /// | `CERTVAULT_REMOTE_ROOT` | unset | Synchronized drive root; unset means no remote |
    /// | `CERTVAULT_PREFERRED_TIER` | `local` | Where documents should live (`local`/`remote`) |
    /// | `CERTVAULT_DISCOVERY_BATCH` | `64` | Containers per discovery batch |
    /// | `CERTVAULT_MOVE_CONCURRENCY` | `4` | Concurrent moves on preference change |
    pub fn from_env() -> Self {
        let local_root = std::env::var("CERTVAULT_LOCAL_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./certvault-data"));

        let remote_root = std::env::var("CERTVAULT_REMOTE_ROOT").ok().map(PathBuf::from);

        let preferred_tier = std::env::var("CERTVAULT_PREFERRED_TIER")
            .ok()
            .and_then(|v| StorageTier::from_str(&v).ok())
            .unwrap_or(StorageTier::Local);

        let discovery_batch_size = std::env::var("CERTVAULT_DISCOVERY_BATCH")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DISCOVERY_BATCH_SIZE)
            .max(1);

        let move_concurrency = std::env::var("CERTVAULT_MOVE_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(MOVE_CONCURRENCY)
            .max(1);

        Self {
            local_root,
            remote_root,
            preferred_tier,
            discovery_batch_size,
            event_capacity: EVENT_BUS_CAPACITY,
            trigger_depth: TRIGGER_CHANNEL_DEPTH,
            move_concurrency,
        }
    }

    /// Set the local storage root.
    pub fn with_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.local_root = root.into();
        self
    }

    /// Set (or clear) the synchronized drive root.
    pub fn with_remote_root(mut self, root: Option<PathBuf>) -> Self {
        self.remote_root = root;
        self
    }

    /// Set the preferred storage tier.
    pub fn with_preferred_tier(mut self, tier: StorageTier) -> Self {
        self.preferred_tier = tier;
        self
    }

    /// Set how many containers move at once during a preference change.
    pub fn with_move_concurrency(mut self, concurrency: usize) -> Self {
        self.move_concurrency = concurrency.max(1);
        self
    }

    /// Path layout implied by the configured roots.
    pub fn layout(&self) -> StorageLayout {
        StorageLayout::new(self.local_root.clone(), self.remote_root.clone())
    }
}
