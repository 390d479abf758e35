//! Tests for the background synchronization loop: triggering, coalescing of
//! trigger bursts, the account and preference handle operations, and
//! graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use certvault_core::events::SyncEvent;
use certvault_core::models::{MediaKind, StorageTier};
use certvault_sync::orchestrator::SyncHandle;
use certvault_sync::test_fixtures::{StaticDirectory, TestVault};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "certvault_sync=debug".into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Wait for the next `SyncCompleted` on the stream, skipping document events.
async fn next_pass(events: &mut broadcast::Receiver<SyncEvent>) -> SyncEvent {
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("a pass should complete in time")
            .expect("event stream open");
        if matches!(event, SyncEvent::SyncCompleted { .. }) {
            return event;
        }
    }
}

/// Wait until the loop task has dropped its trigger receiver.
async fn wait_for_loop_exit(handle: &SyncHandle) {
    for _ in 0..100 {
        if handle.trigger_sync().is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("loop did not stop after shutdown");
}

#[tokio::test]
async fn test_loop_runs_pass_on_trigger() {
    init_tracing();
    let vault = TestVault::local_only();
    vault
        .put_container(
            StorageTier::Local,
            None,
            "seed",
            Uuid::new_v4(),
            MediaKind::Image,
            b"jpeg",
        )
        .await;
    let orchestrator = vault.orchestrator(vault.provider(), StaticDirectory::new());
    let handle = Arc::clone(&orchestrator).start();
    let mut events = handle.events();

    handle.trigger_sync().expect("trigger accepted");

    match next_pass(&mut events).await {
        SyncEvent::SyncCompleted {
            total_records,
            added,
            ..
        } => {
            assert_eq!(total_records, 1);
            assert_eq!(added, 1);
        }
        other => panic!("expected SyncCompleted, got {other:?}"),
    }

    handle.shutdown().await.expect("shutdown accepted");
    wait_for_loop_exit(&handle).await;
}

#[tokio::test]
async fn test_trigger_burst_coalesces() {
    init_tracing();
    let vault = TestVault::local_only();
    let orchestrator = vault.orchestrator(vault.provider(), StaticDirectory::new());
    let handle = Arc::clone(&orchestrator).start();
    let mut events = handle.events();

    for _ in 0..10 {
        handle.trigger_sync().expect("trigger accepted");
    }

    let mut passes = 0;
    while let Ok(received) = timeout(Duration::from_millis(500), events.recv()).await {
        if matches!(received.expect("event stream open"), SyncEvent::SyncCompleted { .. }) {
            passes += 1;
        }
    }

    assert!(passes >= 1, "the burst must run at least one pass");
    assert!(passes < 10, "queued triggers must collapse, got {passes} passes");

    handle.shutdown().await.expect("shutdown accepted");
}

#[tokio::test]
async fn test_account_change_schedules_pass() {
    init_tracing();
    let vault = TestVault::with_remote();
    vault
        .put_container(
            StorageTier::Remote,
            None,
            "from-drive",
            Uuid::new_v4(),
            MediaKind::Document,
            b"pdf",
        )
        .await;
    let orchestrator = vault.orchestrator(vault.provider(), StaticDirectory::new());
    let handle = Arc::clone(&orchestrator).start();
    let mut events = handle.events();

    handle.account_changed().expect("trigger accepted");

    match next_pass(&mut events).await {
        SyncEvent::SyncCompleted {
            total_records,
            remote_available,
            ..
        } => {
            assert_eq!(total_records, 1);
            assert!(remote_available);
        }
        other => panic!("expected SyncCompleted, got {other:?}"),
    }

    handle.shutdown().await.expect("shutdown accepted");
}

#[tokio::test]
async fn test_preference_change_moves_documents_and_schedules_pass() {
    init_tracing();
    let vault = TestVault::with_remote();
    let id = Uuid::new_v4();
    let orchestrator = vault.orchestrator(
        vault.provider(),
        StaticDirectory::new().with_name(id, "Morning Run"),
    );
    orchestrator
        .save_document(id, Some("photo.jpg"), &[0xFF, 0xD8, 0xFF, 0xE0])
        .await
        .expect("save");
    let handle = Arc::clone(&orchestrator).start();
    let mut events = handle.events();

    let report = handle
        .preference_changed(StorageTier::Remote)
        .await
        .expect("preference change accepted");

    assert_eq!(report.moved, 1);
    let snapshot = orchestrator.store().snapshot().await;
    assert_eq!(snapshot[0].metadata.storage_tier, StorageTier::Remote);

    // The scheduled pass settles on the same single record.
    match next_pass(&mut events).await {
        SyncEvent::SyncCompleted {
            total_records,
            added,
            removed,
            ..
        } => {
            assert_eq!(total_records, 1);
            assert_eq!(added, 0);
            assert_eq!(removed, 0);
        }
        other => panic!("expected SyncCompleted, got {other:?}"),
    }

    handle.shutdown().await.expect("shutdown accepted");
}

#[tokio::test]
async fn test_shutdown_stops_accepting_triggers() {
    init_tracing();
    let vault = TestVault::local_only();
    let orchestrator = vault.orchestrator(vault.provider(), StaticDirectory::new());
    let handle = Arc::clone(&orchestrator).start();

    handle.shutdown().await.expect("shutdown accepted");
    wait_for_loop_exit(&handle).await;

    assert!(
        handle.trigger_sync().is_err(),
        "triggers after shutdown must report the stopped loop"
    );
}
