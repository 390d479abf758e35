//! Certificate container codec.
//!
//! A container is a directory bundle named `<stem>.cert` holding exactly two
//! parts: `metadata.json` (the serialized [`CertificateMetadata`]) and
//! `payload.bin` (the document bytes). Writes stage the whole bundle in a
//! sibling directory and rename it into place; a replaced bundle is set
//! aside as a sibling backup until the rename lands, so the previous bundle
//! survives an interruption at any step.
//!
//! Read failures are classified so callers can substitute a placeholder:
//! a missing part is a corrupt container, undecodable metadata is
//! unreadable metadata, and neither aborts the caller's pass.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use certvault_core::defaults::{BACKUP_SUFFIX, METADATA_PART, PAYLOAD_PART, STAGING_SUFFIX};
use certvault_core::models::{CertificateMetadata, CertificateRecord, DocumentLocation, VersionStamp};
use certvault_core::{Error, Result};

/// Write one complete container. Any failure leaves the destination exactly
/// as it was and cleans up the staging directory.
pub async fn write(location: &Path, metadata: &CertificateMetadata, payload: &[u8]) -> Result<()> {
    let encoded = serde_json::to_vec_pretty(metadata)?;
    debug!(location = %location.display(), size = payload.len(), "container: write");

    if let Some(parent) = location.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            warn!(parent = %parent.display(), error = %e, "container: create_dir_all failed");
            Error::WriteFailed {
                path: parent.to_path_buf(),
                source: e,
            }
        })?;
    }

    let staging = staging_path(location);
    if fs::try_exists(&staging).await.unwrap_or(false) {
        // Leftover from an interrupted write; the bundle there is suspect.
        let _ = fs::remove_dir_all(&staging).await;
    }

    let backup = backup_path(location);
    if fs::try_exists(&backup).await.unwrap_or(false) {
        if fs::try_exists(location).await.unwrap_or(false) {
            // A completed replace never got to clear its backup.
            let _ = fs::remove_dir_all(&backup).await;
        } else {
            // An interrupted replace got as far as setting the previous
            // bundle aside; put it back before staging the new one.
            fs::rename(&backup, location).await.map_err(|e| {
                warn!(backup = %backup.display(), location = %location.display(), error = %e, "container: restore backup failed");
                Error::WriteFailed {
                    path: location.to_path_buf(),
                    source: e,
                }
            })?;
        }
    }

    if let Err(e) = stage_bundle(&staging, &encoded, payload).await {
        let _ = fs::remove_dir_all(&staging).await;
        return Err(e);
    }

    // Replace by rename only: the previous bundle moves aside to the backup,
    // the new bundle renames into place, then the backup is dropped. The
    // previous bundle stays recoverable until the destination holds the
    // replacement.
    let had_previous = fs::try_exists(location).await.unwrap_or(false);
    if had_previous {
        if let Err(e) = fs::rename(location, &backup).await {
            warn!(location = %location.display(), error = %e, "container: set previous bundle aside failed");
            let _ = fs::remove_dir_all(&staging).await;
            return Err(Error::WriteFailed {
                path: location.to_path_buf(),
                source: e,
            });
        }
    }

    if let Err(e) = fs::rename(&staging, location).await {
        warn!(from = %staging.display(), to = %location.display(), error = %e, "container: rename failed");
        let _ = fs::remove_dir_all(&staging).await;
        if had_previous {
            let _ = fs::rename(&backup, location).await;
        }
        return Err(Error::WriteFailed {
            path: location.to_path_buf(),
            source: e,
        });
    }

    if had_previous {
        // Reclaimed on the next write if this removal is interrupted.
        let _ = fs::remove_dir_all(&backup).await;
    }

    Ok(())
}

/// Read both parts of a container.
pub async fn read(location: &Path) -> Result<(CertificateMetadata, Vec<u8>)> {
    let metadata = read_metadata(location).await?;

    let payload_path = location.join(PAYLOAD_PART);
    let payload = fs::read(&payload_path).await.map_err(|e| Error::ReadFailed {
        path: payload_path,
        source: e,
    })?;

    Ok((metadata, payload))
}

/// Read and decode only the metadata part, verifying the bundle shape.
pub async fn read_metadata(location: &Path) -> Result<CertificateMetadata> {
    if !fs::try_exists(location).await.unwrap_or(false) {
        return Err(Error::NotFound(location.to_path_buf()));
    }

    let metadata_path = location.join(METADATA_PART);
    if !fs::try_exists(&metadata_path).await.unwrap_or(false) {
        return Err(Error::CorruptContainer {
            path: location.to_path_buf(),
            reason: format!("{} part missing", METADATA_PART),
        });
    }
    if !fs::try_exists(location.join(PAYLOAD_PART)).await.unwrap_or(false) {
        return Err(Error::CorruptContainer {
            path: location.to_path_buf(),
            reason: format!("{} part missing", PAYLOAD_PART),
        });
    }

    let raw = fs::read(&metadata_path).await.map_err(|e| Error::ReadFailed {
        path: metadata_path,
        source: e,
    })?;

    serde_json::from_slice(&raw).map_err(|e| Error::UnreadableMetadata {
        path: location.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Remove a container bundle. Removing an absent container is not an error.
pub async fn remove(location: &Path) -> Result<()> {
    if fs::try_exists(location).await.unwrap_or(false) {
        fs::remove_dir_all(location).await.map_err(|e| Error::WriteFailed {
            path: location.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

pub async fn exists(location: &Path) -> Result<bool> {
    Ok(fs::try_exists(location).await?)
}

/// Rebuild a record from a container on disk. The location reflects where
/// the container actually is; the version stamp is derived from the payload
/// bytes, so a second reconstruction of an unchanged container produces an
/// equal record.
pub async fn reconstruct_record(location: &Path) -> Result<CertificateRecord> {
    let (metadata, payload) = read(location).await?;
    let fingerprint = VersionStamp::fingerprint_payload(&payload);
    Ok(CertificateRecord::new(
        DocumentLocation::new(location),
        metadata,
        VersionStamp::initial(fingerprint),
    ))
}

fn staging_path(location: &Path) -> PathBuf {
    location.with_extension(STAGING_SUFFIX)
}

fn backup_path(location: &Path) -> PathBuf {
    location.with_extension(BACKUP_SUFFIX)
}

async fn stage_bundle(staging: &Path, metadata: &[u8], payload: &[u8]) -> Result<()> {
    fs::create_dir_all(staging).await.map_err(|e| {
        warn!(staging = %staging.display(), error = %e, "container: create staging failed");
        Error::WriteFailed {
            path: staging.to_path_buf(),
            source: e,
        }
    })?;
    write_part(staging, METADATA_PART, metadata).await?;
    write_part(staging, PAYLOAD_PART, payload).await?;
    Ok(())
}

async fn write_part(dir: &Path, name: &str, data: &[u8]) -> Result<()> {
    let path = dir.join(name);
    let mut file = fs::File::create(&path).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "container: File::create failed");
        Error::WriteFailed {
            path: path.clone(),
            source: e,
        }
    })?;
    file.write_all(data).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "container: write_all failed");
        Error::WriteFailed {
            path: path.clone(),
            source: e,
        }
    })?;
    file.sync_all().await.map_err(|e| Error::WriteFailed {
        path: path.clone(),
        source: e,
    })?;
    drop(file);

    // Certificates are user documents, not executables
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))
            .await
            .map_err(|e| Error::WriteFailed { path, source: e })?;
    }

    Ok(())
}
