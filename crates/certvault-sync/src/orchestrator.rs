//! The synchronization orchestrator.
//!
//! One pass works from what actually exists: discovery reads the
//! synchronized drive, the scanner reads local storage, and the merged
//! result replaces the committed set in a single step before being
//! persisted. No pass depends on the previous one having finished cleanly,
//! which is what makes an interrupted pass harmless.
//!
//! Saves and deletes go through the same store and persist the index
//! immediately, so the on-disk index never lags a mutation by more than
//! one crash window.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use certvault_core::defaults::INDEX_FILE_NAME;
use certvault_core::events::{EventBus, SyncEvent};
use certvault_core::media::{detect_media_kind, sanitize_folder_name};
use certvault_core::models::{
    CertificateMetadata, CertificateRecord, DocumentLocation, MediaKind, RecordKey, StorageTier,
    VersionStamp,
};
use certvault_core::traits::ActivityDirectory;
use certvault_core::{Error, Result};
use certvault_store::{container, index, scan, IndexStore, StorageLayout};

use crate::config::SyncConfig;
use crate::discovery::{DiscoveryPhase, RemoteDiscovery, RemoteProvider};
use crate::mover::{self, MoveReport};

// ============================================================================
// Report
// ============================================================================

/// What one synchronization pass did.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub total_records: usize,
    pub added: usize,
    pub removed: usize,
    pub refreshed: usize,
    pub unreadable: usize,
    pub remote_available: bool,
    pub moves: MoveReport,
    pub duration_ms: u64,
}

// ============================================================================
// Handle
// ============================================================================

/// Handle for controlling a running orchestrator loop.
pub struct SyncHandle {
    orchestrator: Arc<SyncOrchestrator>,
    trigger_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<SyncEvent>,
}

impl SyncHandle {
    /// Ask for a synchronization pass. Triggers arriving while a pass runs
    /// collapse into a single following pass, so this never blocks and never
    /// queues duplicate work.
    pub fn trigger_sync(&self) -> Result<()> {
        match self.trigger_tx.try_send(()) {
            Ok(()) => Ok(()),
            // A pass is already pending; this request rides along with it.
            Err(mpsc::error::TrySendError::Full(())) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(())) => Err(Error::Internal(
                "synchronization loop has stopped".to_string(),
            )),
        }
    }

    /// The signed-in account changed; the drive's contents are now suspect
    /// and need a fresh pass.
    pub fn account_changed(&self) -> Result<()> {
        info!("account changed, scheduling synchronization");
        self.trigger_sync()
    }

    /// The user picked a different storage tier. Documents are relocated
    /// right away when the tier is reachable, and a pass is scheduled to
    /// settle everything else.
    pub async fn preference_changed(&self, tier: StorageTier) -> Result<MoveReport> {
        let report = self.orchestrator.set_preferred_tier(tier).await?;
        self.trigger_sync()?;
        Ok(report)
    }

    /// Signal the loop to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".to_string()))?;
        Ok(())
    }

    /// Get a receiver for synchronization events.
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_rx.resubscribe()
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Coordinates discovery, scanning, the record index, and document moves.
pub struct SyncOrchestrator {
    store: Arc<IndexStore>,
    layout: StorageLayout,
    discovery: RemoteDiscovery,
    provider: Arc<dyn RemoteProvider>,
    directory: Arc<dyn ActivityDirectory>,
    events: EventBus,
    preferred: RwLock<StorageTier>,
    // Serializes passes, relocations, and document operations; a save must
    // never land between a pass's snapshot and its commit.
    pass_lock: Mutex<()>,
    config: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(
        config: SyncConfig,
        provider: Arc<dyn RemoteProvider>,
        directory: Arc<dyn ActivityDirectory>,
    ) -> Self {
        let layout = config.layout();
        let events = EventBus::new(config.event_capacity);
        let discovery = RemoteDiscovery::new(provider.clone());
        Self {
            store: Arc::new(IndexStore::new()),
            layout,
            discovery,
            provider,
            directory,
            events,
            preferred: RwLock::new(config.preferred_tier),
            pass_lock: Mutex::new(()),
            config,
        }
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub async fn preferred_tier(&self) -> StorageTier {
        *self.preferred.read().await
    }

    pub async fn discovery_phase(&self) -> DiscoveryPhase {
        self.discovery.phase().await
    }

    /// Start the background loop and return a handle for control.
    pub fn start(self: Arc<Self>) -> SyncHandle {
        let (trigger_tx, mut trigger_rx) = mpsc::channel(self.config.trigger_depth);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.events.subscribe();

        let runner = self.clone();
        tokio::spawn(async move {
            runner.run(&mut trigger_rx, &mut shutdown_rx).await;
        });

        SyncHandle {
            orchestrator: self,
            trigger_tx,
            shutdown_tx,
            event_rx,
        }
    }

    #[instrument(skip(self, trigger_rx, shutdown_rx))]
    async fn run(&self, trigger_rx: &mut mpsc::Receiver<()>, shutdown_rx: &mut mpsc::Receiver<()>) {
        info!("Synchronization loop started");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Synchronization loop received shutdown signal");
                    break;
                }
                trigger = trigger_rx.recv() => {
                    match trigger {
                        Some(()) => {
                            // Collapse everything queued so far into this pass;
                            // triggers arriving during the pass queue the next one.
                            while trigger_rx.try_recv().is_ok() {}
                            if let Err(e) = self.synchronize().await {
                                error!(error = %e, "Synchronization pass failed");
                            }
                        }
                        None => break,
                    }
                }
            }
        }
        info!("Synchronization loop stopped");
    }

    /// Run one full synchronization pass.
    pub async fn synchronize(&self) -> Result<SyncReport> {
        let _pass = self.pass_lock.lock().await;
        let started = Instant::now();
        let preferred = *self.preferred.read().await;
        info!(preferred = %preferred, "sync: pass started");

        self.seed_from_persisted(preferred).await;

        // What the drive holds, when there is a drive to ask.
        let remote = if self.layout.has_remote() {
            match self.discovery.search().await {
                Ok(snapshot) => {
                    self.store.set_remote_observed(snapshot.records.clone()).await;
                    Some(snapshot)
                }
                Err(e) => {
                    warn!(error = %e, "sync: remote unavailable, keeping committed remote records");
                    None
                }
            }
        } else {
            None
        };
        let remote_available = remote.is_some();

        let mut local = scan::scan_certificates_root(&self.layout.local_certificates_root()).await?;
        for record in &mut local.records {
            // Local storage is where these containers physically are,
            // whatever their metadata said when written.
            record.metadata.storage_tier = StorageTier::Local;
        }
        let unreadable =
            local.placeholders.len() + remote.as_ref().map(|r| r.unreadable).unwrap_or(0);

        let mut reality = merge_reality(
            local.records,
            remote.map(|r| r.records).unwrap_or_default(),
            preferred,
        );
        let previous: HashMap<RecordKey, CertificateRecord> = self
            .store
            .snapshot()
            .await
            .into_iter()
            .map(|r| (r.key(), r))
            .collect();

        // A drive that did not answer proves nothing about the documents on
        // it; records the local scan cannot vouch for keep their committed
        // view until the drive answers again.
        if self.layout.has_remote() && !remote_available {
            let local_root = self.layout.local_certificates_root();
            for (key, record) in &previous {
                if !record.location.is_under(&local_root) {
                    reality.entry(*key).or_insert_with(|| record.clone());
                }
            }
        }

        let (next, added, removed, refreshed) = diff_against(previous, reality);
        self.store.replace_all(next).await;

        let index_tier = if preferred == StorageTier::Remote && !remote_available {
            StorageTier::Local
        } else {
            preferred
        };
        self.persist_index(index_tier).await?;
        self.store.clear_remote_observed().await;
        self.discovery.reset().await;

        let total_records = self.store.len().await;
        self.events.emit(SyncEvent::SyncCompleted {
            total_records,
            added,
            removed,
            unreadable,
            remote_available,
        });

        // Residency follows the preference once the set is settled.
        let moves = if preferred == StorageTier::Local || remote_available {
            mover::move_all_to(
                &self.store,
                &self.layout,
                preferred,
                self.config.move_concurrency,
            )
            .await
        } else {
            debug!("sync: preference points at unavailable remote, deferring moves");
            MoveReport::default()
        };
        if moves.moved > 0 {
            self.persist_index(index_tier).await?;
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            total_records,
            added, removed, refreshed, unreadable, remote_available, duration_ms,
            "sync: pass finished"
        );

        Ok(SyncReport {
            total_records,
            added,
            removed,
            refreshed,
            unreadable,
            remote_available,
            moves,
            duration_ms,
        })
    }

    /// Store a document payload for an activity and commit its record.
    /// Media kind is detected from the payload, so saving a photo and a GPX
    /// track for the same activity yields two independent documents.
    pub async fn save_document(
        &self,
        assigned_object_id: Uuid,
        original_filename: Option<&str>,
        payload: &[u8],
    ) -> Result<CertificateRecord> {
        let _pass = self.pass_lock.lock().await;
        let media_kind = detect_media_kind(original_filename.unwrap_or(""), payload);
        let key = RecordKey {
            assigned_object_id,
            media_kind,
        };
        let tier = self.usable_write_tier().await;

        let (folder, stem) = match self.directory.activity_name(assigned_object_id).await {
            Some(name) => (
                Some(sanitize_folder_name(&name)),
                container_stem(assigned_object_id, media_kind, original_filename),
            ),
            // No activity name to group under: flat placement, timestamped
            // so the certificates root stays browsable by date.
            None => (
                None,
                flat_fallback_stem(assigned_object_id, media_kind, original_filename, Utc::now()),
            ),
        };
        let destination = match self.layout.container_destination(tier, folder.as_deref(), &stem) {
            Some(destination) => destination,
            None => {
                return Err(Error::WriteFailed {
                    path: self.layout.local_certificates_root(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "no certificates root for write tier",
                    ),
                })
            }
        };

        let fingerprint = VersionStamp::fingerprint_payload(payload);
        let version = match self.store.get(&key).await {
            Some(previous) => previous.version.bumped(Some(fingerprint)),
            None => VersionStamp::initial(fingerprint),
        };

        let mut metadata = CertificateMetadata::new(tier, assigned_object_id, media_kind);
        if let Some(name) = original_filename {
            metadata = metadata.with_original_filename(name);
        }

        container::write(&destination, &metadata, payload).await?;
        let record = CertificateRecord::new(DocumentLocation::new(&destination), metadata, version);

        if let Some(displaced) = self.store.insert(record.clone()).await {
            // A re-save under a new activity name lands at a new location;
            // the container at the old one is now unreferenced.
            if displaced.location != record.location {
                if let Err(e) = container::remove(displaced.location.as_path()).await {
                    warn!(location = %displaced.location, error = %e, "save: superseded container not removed");
                }
            }
        }

        self.persist_index(tier).await?;
        self.events.emit(SyncEvent::SaveCompleted {
            assigned_object_id,
            media_kind,
            location: record.location.to_string(),
        });
        info!(%assigned_object_id, kind = %media_kind, location = %record.location, "save: document stored");
        Ok(record)
    }

    /// Remove a document and its record. Returns `false` when nothing is
    /// committed for the pair, without touching disk or emitting an event.
    pub async fn delete_document(
        &self,
        assigned_object_id: Uuid,
        media_kind: MediaKind,
    ) -> Result<bool> {
        let _pass = self.pass_lock.lock().await;
        let key = RecordKey {
            assigned_object_id,
            media_kind,
        };
        let existing = match self.store.get(&key).await {
            Some(existing) => existing,
            None => {
                debug!(%assigned_object_id, kind = %media_kind, "delete: nothing committed for pair");
                return Ok(false);
            }
        };

        // Container first. If this fails the record stays committed and the
        // document stays reachable.
        container::remove(existing.location.as_path()).await?;
        self.store.remove(&key).await;

        self.persist_index(self.usable_write_tier().await).await?;
        self.events.emit(SyncEvent::DeleteCompleted {
            assigned_object_id,
            media_kind,
        });
        info!(%assigned_object_id, kind = %media_kind, "delete: document removed");
        Ok(true)
    }

    /// Fetch the committed record and payload for a pair, if there is one.
    pub async fn load_payload(
        &self,
        assigned_object_id: Uuid,
        media_kind: MediaKind,
    ) -> Result<Option<(CertificateRecord, Vec<u8>)>> {
        let key = RecordKey {
            assigned_object_id,
            media_kind,
        };
        let record = match self.store.get(&key).await {
            Some(record) => record,
            None => return Ok(None),
        };
        let (_, payload) = container::read(record.location.as_path()).await?;
        Ok(Some((record, payload)))
    }

    /// Change where documents should live. When the target tier is reachable
    /// every committed document is moved right away; otherwise the move
    /// happens on the next synchronization pass that finds it reachable.
    pub async fn set_preferred_tier(&self, tier: StorageTier) -> Result<MoveReport> {
        {
            let mut preferred = self.preferred.write().await;
            if *preferred == tier {
                return Ok(MoveReport::default());
            }
            *preferred = tier;
        }
        info!(tier = %tier, "preference changed");

        let _pass = self.pass_lock.lock().await;
        let reachable = match tier {
            StorageTier::Local => true,
            StorageTier::Remote => self.layout.has_remote() && self.provider.is_available().await,
        };
        if !reachable {
            warn!(tier = %tier, "preferred tier unreachable, moves deferred to next sync");
            return Ok(MoveReport::default());
        }

        let report =
            mover::move_all_to(&self.store, &self.layout, tier, self.config.move_concurrency).await;
        self.persist_index(tier).await?;
        Ok(report)
    }

    /// Seed the in-memory index from the persisted file on the first pass.
    /// An unreadable file is logged and ignored; the pass rebuilds state
    /// from the containers themselves.
    async fn seed_from_persisted(&self, preferred: StorageTier) {
        if !self.store.is_empty().await {
            return;
        }
        let primary = self.index_path(preferred);
        let fallback = self.index_path(preferred.other());
        let mut candidates = vec![primary];
        if fallback != candidates[0] {
            candidates.push(fallback);
        }

        for path in candidates {
            match index::load(&path).await {
                Ok(records) if !records.is_empty() => {
                    debug!(path = %path.display(), records = records.len(), "sync: seeded from persisted index");
                    self.store.replace_all(records).await;
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "sync: persisted index unreadable, rebuilding from storage");
                }
            }
        }
    }

    async fn persist_index(&self, tier: StorageTier) -> Result<()> {
        let target = self.index_path(tier);
        let stale = self.index_path(tier.other());
        if stale != target {
            match index::relocate_index_file(&stale, &target).await {
                Ok(true) => debug!(to = %target.display(), "sync: index file followed preference"),
                Ok(false) => {}
                Err(e) => debug!(error = %e, "sync: stale index not relocated"),
            }
        }
        index::persist(&self.store, &target).await
    }

    fn index_path(&self, tier: StorageTier) -> std::path::PathBuf {
        self.layout
            .index_path(tier)
            .unwrap_or_else(|| self.layout.local_certificates_root().join(INDEX_FILE_NAME))
    }

    /// Where writes should land right now: the preferred tier when its root
    /// is reachable, local otherwise.
    async fn usable_write_tier(&self) -> StorageTier {
        let preferred = *self.preferred.read().await;
        match preferred {
            StorageTier::Local => StorageTier::Local,
            StorageTier::Remote => {
                if self.layout.has_remote() && self.provider.is_available().await {
                    StorageTier::Remote
                } else {
                    StorageTier::Local
                }
            }
        }
    }
}

// ============================================================================
// Pass arithmetic
// ============================================================================

/// Collapse the local and remote record sets into one view of what exists,
/// one record per `(assigned_object_id, media_kind)` pair.
fn merge_reality(
    local: Vec<CertificateRecord>,
    remote: Vec<CertificateRecord>,
    preferred: StorageTier,
) -> HashMap<RecordKey, CertificateRecord> {
    let mut merged: HashMap<RecordKey, CertificateRecord> = HashMap::new();
    for record in local.into_iter().chain(remote) {
        match merged.entry(record.key()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if prefers(&record, slot.get(), preferred) {
                    debug!(key = %slot.key(), "sync: duplicate pair, keeping preferred copy");
                    slot.insert(record);
                }
            }
        }
    }
    merged
}

/// Duplicate copies of the same pair: the copy on the preferred tier wins,
/// then the higher version sequence, then the remote copy.
fn prefers(
    candidate: &CertificateRecord,
    incumbent: &CertificateRecord,
    preferred: StorageTier,
) -> bool {
    let candidate_preferred = candidate.metadata.storage_tier == preferred;
    let incumbent_preferred = incumbent.metadata.storage_tier == preferred;
    if candidate_preferred != incumbent_preferred {
        return candidate_preferred;
    }
    if candidate.version.sequence != incumbent.version.sequence {
        return candidate.version.sequence > incumbent.version.sequence;
    }
    candidate.metadata.storage_tier == StorageTier::Remote
}

/// Produce the next committed set from what was known and what exists.
/// Returns `(next, added, removed, refreshed)`. A record whose container
/// is unchanged keeps its committed version, so repeating a pass with
/// nothing changed commits exactly the same set again.
fn diff_against(
    previous: HashMap<RecordKey, CertificateRecord>,
    reality: HashMap<RecordKey, CertificateRecord>,
) -> (Vec<CertificateRecord>, usize, usize, usize) {
    let mut next = Vec::with_capacity(reality.len());
    let mut added = 0;
    let mut refreshed = 0;

    for (key, observed) in reality {
        match previous.get(&key) {
            None => {
                added += 1;
                next.push(observed);
            }
            Some(known) => {
                let same_content = known.version.fingerprint == observed.version.fingerprint;
                if same_content && known.location == observed.location {
                    next.push(known.clone());
                } else {
                    // The container changed or moved underneath us; adopt
                    // what exists and advance the committed version.
                    refreshed += 1;
                    let version = known.version.bumped(
                        (!same_content).then(|| observed.version.fingerprint.clone()),
                    );
                    next.push(CertificateRecord::new(
                        observed.location,
                        observed.metadata,
                        version,
                    ));
                }
            }
        }
    }

    let kept = next.len() - added;
    let removed = previous.len() - kept;
    (next, added, removed, refreshed)
}

fn container_stem(
    assigned_object_id: Uuid,
    media_kind: MediaKind,
    original_filename: Option<&str>,
) -> String {
    let base = format!("{assigned_object_id}-{media_kind}");
    match original_filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
    {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

fn flat_fallback_stem(
    assigned_object_id: Uuid,
    media_kind: MediaKind,
    original_filename: Option<&str>,
    at: DateTime<Utc>,
) -> String {
    format!(
        "cert-{}-{}",
        at.format("%Y%m%d%H%M%S"),
        container_stem(assigned_object_id, media_kind, original_filename)
    )
}
