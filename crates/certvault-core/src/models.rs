//! Core data models for certvault.
//!
//! These types are shared across all certvault crates and represent the
//! certificate documents tracked by the synchronization core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

// =============================================================================
// STORAGE TIERS & MEDIA KINDS
// =============================================================================

/// Which backend a document is meant to live on.
///
/// This is the *intended* home recorded in metadata; the record's location
/// says where the document actually is. The two may disagree while a move is
/// in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageTier {
    Local,
    Remote,
}

impl StorageTier {
    /// The opposite tier, used when relocating documents or the index file.
    pub fn other(&self) -> StorageTier {
        match self {
            Self::Local => Self::Remote,
            Self::Remote => Self::Local,
        }
    }
}

impl std::fmt::Display for StorageTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

impl std::str::FromStr for StorageTier {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            _ => Err(format!("Invalid storage tier: {}", s)),
        }
    }
}

/// Decode path selector for a certificate document's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Document,
    Audio,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Document => write!(f, "document"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "document" => Ok(Self::Document),
            "audio" => Ok(Self::Audio),
            _ => Err(format!("Invalid media kind: {}", s)),
        }
    }
}

// =============================================================================
// DOCUMENT LOCATIONS
// =============================================================================

/// Resolved residence of a document container on one of the backends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentLocation(PathBuf);

impl DocumentLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Whether this location resolves under the given backend root.
    pub fn is_under(&self, root: &Path) -> bool {
        self.0.starts_with(root)
    }

    /// Container directory name without the trailing extension token.
    pub fn stem(&self) -> Option<&str> {
        self.0.file_stem().and_then(|s| s.to_str())
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl From<PathBuf> for DocumentLocation {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl AsRef<Path> for DocumentLocation {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for DocumentLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

// =============================================================================
// VERSION STAMPS
// =============================================================================

/// Monotonically-tagged version stamp for structural-change detection.
///
/// `fingerprint` identifies the payload bytes; `sequence` increments every
/// time a record for the same key is replaced. Neither is used for conflict
/// resolution beyond "fresher wins".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStamp {
    pub fingerprint: String,
    #[serde(default)]
    pub sequence: u64,
}

impl VersionStamp {
    /// First stamp for a newly created record.
    pub fn initial(fingerprint: String) -> Self {
        Self {
            fingerprint,
            sequence: 1,
        }
    }

    /// Next stamp after a structural change. The fingerprint is replaced
    /// only when the payload itself changed.
    pub fn bumped(&self, fingerprint: Option<String>) -> Self {
        Self {
            fingerprint: fingerprint.unwrap_or_else(|| self.fingerprint.clone()),
            sequence: self.sequence + 1,
        }
    }

    /// Content fingerprint of a readable payload.
    pub fn fingerprint_payload(data: &[u8]) -> String {
        format!("blake3:{}", blake3::hash(data).to_hex())
    }

    /// Fallback fingerprint when only filesystem metadata is available.
    pub fn fingerprint_mtime(unix_secs: i64) -> String {
        format!("mtime:{}", unix_secs)
    }
}

// =============================================================================
// CERTIFICATE RECORDS
// =============================================================================

/// Identity of a record for every set-membership and reconciliation
/// decision. Two records with the same key describe the same document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub assigned_object_id: Uuid,
    pub media_kind: MediaKind,
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.assigned_object_id, self.media_kind)
    }
}

/// Descriptive metadata stored inside each container.
///
/// Decode is tolerant of containers written by other writers: optional
/// fields default, unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMetadata {
    pub storage_tier: StorageTier,
    pub assigned_object_id: Uuid,
    pub media_kind: MediaKind,
    #[serde(default)]
    pub is_placeholder: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
}

impl CertificateMetadata {
    pub fn new(storage_tier: StorageTier, assigned_object_id: Uuid, media_kind: MediaKind) -> Self {
        Self {
            storage_tier,
            assigned_object_id,
            media_kind,
            is_placeholder: false,
            created_at: Utc::now(),
            original_filename: None,
        }
    }

    pub fn with_original_filename(mut self, filename: impl Into<String>) -> Self {
        self.original_filename = Some(filename.into());
        self
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            assigned_object_id: self.assigned_object_id,
            media_kind: self.media_kind,
        }
    }
}

/// One tracked certificate document: where it is, what it is, and a stamp
/// for change detection.
///
/// Records are immutable values. Any state change (a move, a re-save)
/// produces a new record that replaces the old one in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub location: DocumentLocation,
    pub metadata: CertificateMetadata,
    pub version: VersionStamp,
}

impl CertificateRecord {
    pub fn new(
        location: DocumentLocation,
        metadata: CertificateMetadata,
        version: VersionStamp,
    ) -> Self {
        Self {
            location,
            metadata,
            version,
        }
    }

    /// Stand-in for an unreadable container found on disk. Placeholders are
    /// shown to the user as a damaged slot; they are never written to the
    /// persisted index and never enter reconciliation.
    pub fn placeholder(location: DocumentLocation, media_kind: MediaKind) -> Self {
        let mut metadata = CertificateMetadata::new(StorageTier::Local, Uuid::new_v4(), media_kind);
        metadata.is_placeholder = true;
        let fingerprint = VersionStamp::fingerprint_mtime(Utc::now().timestamp());
        Self {
            location,
            metadata,
            version: VersionStamp::initial(fingerprint),
        }
    }

    pub fn key(&self) -> RecordKey {
        self.metadata.key()
    }

    pub fn assigned_object_id(&self) -> Uuid {
        self.metadata.assigned_object_id
    }

    pub fn media_kind(&self) -> MediaKind {
        self.metadata.media_kind
    }

    pub fn storage_tier(&self) -> StorageTier {
        self.metadata.storage_tier
    }

    pub fn is_placeholder(&self) -> bool {
        self.metadata.is_placeholder
    }

    /// Replacement record after a successful physical move. The payload is
    /// unchanged, so the fingerprint carries over and only the sequence and
    /// residence change.
    pub fn moved_to(&self, location: DocumentLocation, tier: StorageTier) -> Self {
        let mut metadata = self.metadata.clone();
        metadata.storage_tier = tier;
        Self {
            location,
            metadata,
            version: self.version.bumped(None),
        }
    }
}
