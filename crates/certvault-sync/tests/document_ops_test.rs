//! Tests for the document-level operations on the orchestrator: save,
//! delete, and payload loading.
//!
//! Covers foldered and flat placement, folder-name sanitization, media-kind
//! detection from payload bytes, re-save versioning, the independence of
//! different kinds under one activity, the completion events each operation
//! emits, and the serialization of document operations against a running
//! pass.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use certvault_core::events::SyncEvent;
use certvault_core::models::{MediaKind, StorageTier};
use certvault_core::Result;
use certvault_store::{container, index};
use certvault_sync::discovery::RemoteProvider;
use certvault_sync::orchestrator::SyncOrchestrator;
use certvault_sync::test_fixtures::{StaticDirectory, TestVault};
use tokio::sync::mpsc;
use uuid::Uuid;

fn jpeg_bytes() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01]
}

fn pdf_bytes(tag: &str) -> Vec<u8> {
    format!("%PDF-1.4\n{tag}").into_bytes()
}

#[tokio::test]
async fn test_save_places_document_under_activity_folder() {
    let vault = TestVault::local_only();
    let id = Uuid::new_v4();
    let directory = StaticDirectory::new().with_name(id, "Berlin Marathon 2026");
    let orchestrator = vault.orchestrator(vault.provider(), directory);
    let mut events = orchestrator.events().subscribe();

    let record = orchestrator
        .save_document(id, Some("finisher.jpg"), &jpeg_bytes())
        .await
        .expect("save should succeed");

    assert_eq!(record.metadata.media_kind, MediaKind::Image);
    assert_eq!(record.metadata.assigned_object_id, id);
    let path = record.location.as_path();
    assert_eq!(
        path.parent().and_then(|p| p.file_name()).unwrap(),
        "Berlin Marathon 2026"
    );
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        format!("{id}-image.jpg.cert")
    );

    let (metadata, payload) = container::read(path).await.expect("container readable");
    assert_eq!(payload, jpeg_bytes());
    assert_eq!(metadata.original_filename.as_deref(), Some("finisher.jpg"));

    let persisted = index::load(&vault.index_path(StorageTier::Local).unwrap())
        .await
        .expect("index persisted");
    assert_eq!(persisted.len(), 1);

    match events.recv().await.expect("save event") {
        SyncEvent::SaveCompleted {
            assigned_object_id,
            media_kind,
            location,
        } => {
            assert_eq!(assigned_object_id, id);
            assert_eq!(media_kind, MediaKind::Image);
            assert_eq!(location, record.location.to_string());
        }
        other => panic!("expected SaveCompleted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_save_sanitizes_activity_folder_name() {
    let vault = TestVault::local_only();
    let id = Uuid::new_v4();
    let directory = StaticDirectory::new().with_name(id, "Trail: Run/10K?");
    let orchestrator = vault.orchestrator(vault.provider(), directory);

    let record = orchestrator
        .save_document(id, None, &pdf_bytes("results"))
        .await
        .expect("save should succeed");

    let folder = record
        .location
        .as_path()
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .expect("folder component");
    assert_eq!(folder, "Trail_ Run_10K_");
    assert!(container::exists(record.location.as_path()).await.unwrap());
}

#[tokio::test]
async fn test_save_without_directory_entry_lands_flat_and_timestamped() {
    let vault = TestVault::local_only();
    let id = Uuid::new_v4();
    let orchestrator = vault.orchestrator(vault.provider(), StaticDirectory::new());

    let record = orchestrator
        .save_document(id, Some("mystery.pdf"), &pdf_bytes("x"))
        .await
        .expect("save should succeed");

    let path = record.location.as_path();
    assert_eq!(
        path.parent().unwrap(),
        vault.local_certificates_root(),
        "unknown activities are not given a folder"
    );
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("cert-"), "got {name}");
    assert!(name.contains(&id.to_string()), "got {name}");
    assert!(name.ends_with("-document.pdf.cert"), "got {name}");
}

#[tokio::test]
async fn test_resave_replaces_in_place_and_bumps_version() {
    let vault = TestVault::local_only();
    let id = Uuid::new_v4();
    let directory = StaticDirectory::new().with_name(id, "Lake Swim");
    let orchestrator = vault.orchestrator(vault.provider(), directory);

    let first = orchestrator
        .save_document(id, Some("scan.pdf"), &pdf_bytes("draft"))
        .await
        .expect("first save");
    let second = orchestrator
        .save_document(id, Some("scan.pdf"), &pdf_bytes("final"))
        .await
        .expect("second save");

    assert_eq!(first.location, second.location, "stable stem, same container");
    assert_eq!(first.version.sequence, 1);
    assert_eq!(second.version.sequence, 2);
    assert_ne!(first.version.fingerprint, second.version.fingerprint);

    let (_, payload) = container::read(second.location.as_path()).await.unwrap();
    assert_eq!(payload, pdf_bytes("final"));

    let folder = second.location.as_path().parent().unwrap().to_path_buf();
    let entries = std::fs::read_dir(folder).unwrap().count();
    assert_eq!(entries, 1, "the re-save must not leave a second container");
}

#[tokio::test]
async fn test_kinds_for_same_activity_are_independent() {
    let vault = TestVault::local_only();
    let id = Uuid::new_v4();
    let directory = StaticDirectory::new().with_name(id, "Morning Run");
    let orchestrator = vault.orchestrator(vault.provider(), directory);

    let photo = orchestrator
        .save_document(id, Some("finish.jpg"), &jpeg_bytes())
        .await
        .expect("photo save");
    let track = orchestrator
        .save_document(id, Some("track.gpx"), b"<gpx>points</gpx>")
        .await
        .expect("track save");

    assert_eq!(photo.metadata.media_kind, MediaKind::Image);
    assert_eq!(track.metadata.media_kind, MediaKind::Document);
    assert_ne!(photo.location, track.location);
    assert_eq!(orchestrator.store().len().await, 2);

    // Removing one kind leaves the other committed.
    let deleted = orchestrator
        .delete_document(id, MediaKind::Image)
        .await
        .expect("delete photo");
    assert!(deleted);
    assert_eq!(orchestrator.store().len().await, 1);
    assert!(orchestrator.store().has_any_for(id).await);
}

#[tokio::test]
async fn test_delete_removes_container_and_record() {
    let vault = TestVault::local_only();
    let id = Uuid::new_v4();
    let orchestrator = vault.orchestrator(
        vault.provider(),
        StaticDirectory::new().with_name(id, "Night Ride"),
    );

    let record = orchestrator
        .save_document(id, Some("route.jpg"), &jpeg_bytes())
        .await
        .expect("save");
    let mut events = orchestrator.events().subscribe();

    let deleted = orchestrator
        .delete_document(id, MediaKind::Image)
        .await
        .expect("delete");
    assert!(deleted);
    assert!(!container::exists(record.location.as_path()).await.unwrap());

    let persisted = index::load(&vault.index_path(StorageTier::Local).unwrap())
        .await
        .expect("index readable");
    assert!(persisted.is_empty(), "deletion must reach the persisted index");

    match events.recv().await.expect("delete event") {
        SyncEvent::DeleteCompleted {
            assigned_object_id,
            media_kind,
        } => {
            assert_eq!(assigned_object_id, id);
            assert_eq!(media_kind, MediaKind::Image);
        }
        other => panic!("expected DeleteCompleted, got {other:?}"),
    }

    // A second delete finds nothing and says so without an event.
    let again = orchestrator
        .delete_document(id, MediaKind::Image)
        .await
        .expect("repeat delete");
    assert!(!again);
    assert!(events.try_recv().is_err(), "no event for a no-op delete");
}

#[tokio::test]
async fn test_load_payload_round_trip() {
    let vault = TestVault::local_only();
    let id = Uuid::new_v4();
    let orchestrator = vault.orchestrator(
        vault.provider(),
        StaticDirectory::new().with_name(id, "Hill Repeats"),
    );

    let saved = orchestrator
        .save_document(id, Some("splits.pdf"), &pdf_bytes("splits"))
        .await
        .expect("save");

    let (record, payload) = orchestrator
        .load_payload(id, MediaKind::Document)
        .await
        .expect("load")
        .expect("pair is committed");
    assert_eq!(record.location, saved.location);
    assert_eq!(payload, pdf_bytes("splits"));

    let missing = orchestrator
        .load_payload(Uuid::new_v4(), MediaKind::Image)
        .await
        .expect("load of unknown pair");
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_save_follows_preference_onto_drive() {
    let vault = TestVault::with_remote();
    let id = Uuid::new_v4();
    let orchestrator = vault.orchestrator(
        vault.provider(),
        StaticDirectory::new().with_name(id, "Lake Swim"),
    );
    orchestrator
        .set_preferred_tier(StorageTier::Remote)
        .await
        .expect("preference change");

    let record = orchestrator
        .save_document(id, Some("medal.jpg"), &jpeg_bytes())
        .await
        .expect("save");

    assert_eq!(record.metadata.storage_tier, StorageTier::Remote);
    assert!(record
        .location
        .as_path()
        .starts_with(vault.remote_certificates_root()));
    let remote_index = vault.index_path(StorageTier::Remote).unwrap();
    assert_eq!(index::load(&remote_index).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_save_falls_back_to_local_when_drive_offline() {
    let vault = TestVault::with_remote();
    let provider = vault.provider();
    let id = Uuid::new_v4();
    let orchestrator = vault.orchestrator(
        provider.clone(),
        StaticDirectory::new().with_name(id, "Lake Swim"),
    );
    orchestrator
        .set_preferred_tier(StorageTier::Remote)
        .await
        .expect("preference change");
    provider.set_available(false);

    let record = orchestrator
        .save_document(id, Some("medal.jpg"), &jpeg_bytes())
        .await
        .expect("save while offline");

    assert_eq!(record.metadata.storage_tier, StorageTier::Local);
    assert!(record
        .location
        .as_path()
        .starts_with(vault.local_certificates_root()));
}

/// Provider that reports available but takes a while to enumerate, so other
/// calls can arrive while a pass is underway.
struct SlowEmptyProvider;

#[async_trait]
impl RemoteProvider for SlowEmptyProvider {
    async fn is_available(&self) -> bool {
        true
    }

    async fn enumerate(&self, _batches: mpsc::Sender<Vec<PathBuf>>) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_save_arriving_mid_pass_waits_for_the_pass() {
    let vault = TestVault::with_remote();
    let id = Uuid::new_v4();
    let orchestrator = Arc::new(SyncOrchestrator::new(
        vault.config.clone(),
        Arc::new(SlowEmptyProvider),
        Arc::new(StaticDirectory::new().with_name(id, "Lake Swim")),
    ));
    orchestrator
        .set_preferred_tier(StorageTier::Remote)
        .await
        .expect("preference change");

    let pass = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.synchronize().await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    // The pass is mid-enumeration. The save must not land between the
    // pass's snapshot and its commit, where the diff would read the new
    // record as a removal.
    let record = orchestrator
        .save_document(id, Some("medal.jpg"), &jpeg_bytes())
        .await
        .expect("save");
    let report = pass.await.expect("pass task").expect("pass");

    assert_eq!(report.removed, 0, "the pass saw the world before the save");
    assert_eq!(report.total_records, 0);
    assert_eq!(orchestrator.store().len().await, 1);
    assert!(container::exists(record.location.as_path()).await.unwrap());

    let persisted = index::load(&vault.index_path(StorageTier::Remote).unwrap())
        .await
        .expect("index readable");
    assert_eq!(persisted.len(), 1, "the save committed after the pass");
}

#[tokio::test]
async fn test_delete_arriving_mid_pass_waits_for_the_pass() {
    let vault = TestVault::with_remote();
    let id = Uuid::new_v4();
    let orchestrator = Arc::new(SyncOrchestrator::new(
        vault.config.clone(),
        Arc::new(SlowEmptyProvider),
        Arc::new(StaticDirectory::new().with_name(id, "Lake Swim")),
    ));
    let record = orchestrator
        .save_document(id, Some("medal.jpg"), &jpeg_bytes())
        .await
        .expect("save");

    let pass = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.synchronize().await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let deleted = orchestrator
        .delete_document(id, MediaKind::Image)
        .await
        .expect("delete");
    let report = pass.await.expect("pass task").expect("pass");

    assert!(deleted);
    assert_eq!(report.total_records, 1, "the pass saw the world before the delete");
    assert_eq!(orchestrator.store().len().await, 0);
    assert!(!container::exists(record.location.as_path()).await.unwrap());
}
