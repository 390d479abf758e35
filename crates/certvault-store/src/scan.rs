//! Certificate root enumeration.
//!
//! Scans the flat layout (`<root>/<name>.cert`) and the foldered layout
//! (`<root>/<activity>/<name>.cert`) in one pass. Anything deeper is ignored,
//! as are files that are not containers, including the persisted index that
//! lives next to the bundles.
//!
//! A container that exists but cannot be decoded never aborts the scan. It
//! comes back as a placeholder record so callers still know something holds
//! that location.

use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

use certvault_core::media::kind_from_extension;
use certvault_core::models::{CertificateRecord, DocumentLocation, MediaKind};
use certvault_core::{Error, Result};

use crate::container;
use crate::layout::StorageLayout;

/// Everything one pass over a certificates root produced.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Records rebuilt from readable containers.
    pub records: Vec<CertificateRecord>,
    /// Stand-ins for containers that exist but could not be decoded.
    pub placeholders: Vec<CertificateRecord>,
}

impl ScanOutcome {
    /// Containers encountered, readable or not.
    pub fn seen(&self) -> usize {
        self.records.len() + self.placeholders.len()
    }
}

/// Enumerate every container under `root`. A missing root is an empty
/// outcome, not an error.
pub async fn scan_certificates_root(root: &Path) -> Result<ScanOutcome> {
    if !fs::try_exists(root).await.unwrap_or(false) {
        debug!(root = %root.display(), "scan: root does not exist");
        return Ok(ScanOutcome::default());
    }

    let mut outcome = ScanOutcome::default();
    let mut top = fs::read_dir(root).await.map_err(|e| Error::ReadFailed {
        path: root.to_path_buf(),
        source: e,
    })?;

    loop {
        let entry = match top.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                debug!(root = %root.display(), error = %e, "scan: skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        if StorageLayout::is_container_name(&path) {
            visit_container(&path, &mut outcome).await;
        } else {
            scan_activity_folder(&path, &mut outcome).await;
        }
    }

    if !outcome.placeholders.is_empty() {
        warn!(
            seen = outcome.seen(),
            unreadable = outcome.placeholders.len(),
            root = %root.display(),
            "scan: some containers could not be read"
        );
    }

    Ok(outcome)
}

async fn scan_activity_folder(folder: &Path, outcome: &mut ScanOutcome) {
    let mut entries = match fs::read_dir(folder).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(folder = %folder.display(), error = %e, "scan: skipping unreadable folder");
            return;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.is_dir() && StorageLayout::is_container_name(&path) {
            visit_container(&path, outcome).await;
        }
    }
}

async fn visit_container(path: &Path, outcome: &mut ScanOutcome) {
    match container::reconstruct_record(path).await {
        Ok(record) => outcome.records.push(record),
        Err(e) => {
            debug!(location = %path.display(), error = %e, "scan: container unreadable");
            outcome.placeholders.push(CertificateRecord::placeholder(
                DocumentLocation::new(path),
                media_kind_hint(path),
            ));
        }
    }
}

/// Guess a media kind for a container we cannot open, from whatever inner
/// extension the bundle name preserves ("finisher.jpg.cert" hints image).
fn media_kind_hint(path: &Path) -> MediaKind {
    path.file_stem()
        .and_then(|stem| Path::new(stem).extension())
        .and_then(|ext| ext.to_str())
        .and_then(kind_from_extension)
        .unwrap_or(MediaKind::Document)
}
