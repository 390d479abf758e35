//! Moving containers between storage tiers.
//!
//! A move is a staged write at the destination followed by removal of the
//! source, never a delete-then-copy. Every observable failure leaves the
//! source container and the committed record exactly as they were; the one
//! crash window after the destination lands leaves the document present on
//! both tiers, which the next reconciliation pass collapses.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info};

use certvault_core::models::{CertificateRecord, StorageTier};
use certvault_core::{Error, Result};
use certvault_store::{container, IndexStore, StorageLayout};

/// What a batch move accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveReport {
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Move one container to the other tier and return the record describing it
/// at its new location. A record already on `to` comes back unchanged.
pub async fn move_document(
    layout: &StorageLayout,
    record: &CertificateRecord,
    to: StorageTier,
) -> Result<CertificateRecord> {
    if layout.tier_of(&record.location) == Some(to) {
        return Ok(record.clone());
    }

    let destination = layout.relocated_path(&record.location, to).ok_or_else(|| {
        Error::MoveFailed {
            from: record.location.as_path().to_path_buf(),
            to: PathBuf::new(),
            reason: format!("no storage root configured for tier {to}"),
        }
    })?;

    let from = record.location.as_path();
    let (mut metadata, payload) = container::read(from).await.map_err(|e| Error::MoveFailed {
        from: from.to_path_buf(),
        to: destination.clone(),
        reason: format!("source unreadable: {e}"),
    })?;
    metadata.storage_tier = to;

    // The destination write is staged, so until it completes the only
    // complete container is still the source.
    container::write(&destination, &metadata, &payload)
        .await
        .map_err(|e| Error::MoveFailed {
            from: from.to_path_buf(),
            to: destination.clone(),
            reason: format!("destination write failed: {e}"),
        })?;

    if let Err(e) = container::remove(from).await {
        // Both copies exist now; reconciliation will drop the stale one.
        debug!(from = %from.display(), error = %e, "move: source removal failed");
    }

    debug!(from = %from.display(), to = %destination.display(), "move: relocated");
    Ok(record.moved_to(destination.into(), to))
}

/// Move every committed document onto `to`, a bounded batch at a time, and
/// commit each success into the index. One failed move never stops the rest.
pub async fn move_all_to(
    store: &Arc<IndexStore>,
    layout: &StorageLayout,
    to: StorageTier,
    concurrency: usize,
) -> MoveReport {
    let mut report = MoveReport::default();
    if layout.certificates_root(to).is_none() {
        debug!(tier = %to, "move: target tier has no root, nothing to do");
        return report;
    }

    let candidates: Vec<CertificateRecord> = store
        .snapshot()
        .await
        .into_iter()
        .filter(|r| !r.metadata.is_placeholder)
        .collect();

    for chunk in candidates.chunks(concurrency.max(1)) {
        let mut tasks = JoinSet::new();
        for record in chunk {
            if layout.tier_of(&record.location) == Some(to) {
                report.skipped += 1;
                continue;
            }
            let layout = layout.clone();
            let record = record.clone();
            tasks.spawn(async move { move_document(&layout, &record, to).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(moved)) => {
                    store.insert(moved).await;
                    report.moved += 1;
                }
                Ok(Err(e)) => {
                    error!(error = %e, "move: container move failed");
                    report.failed += 1;
                }
                Err(e) => {
                    error!(error = ?e, "move: task panicked");
                    report.failed += 1;
                }
            }
        }
    }

    if report.moved > 0 || report.failed > 0 {
        info!(
            moved = report.moved,
            skipped = report.skipped,
            failed = report.failed,
            tier = %to,
            "move: batch finished"
        );
    }
    report
}
