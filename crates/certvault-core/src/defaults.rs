//! Centralized default constants for the certvault system.
//!
//! **This module is the single source of truth** for all shared default
//! values. The store and sync crates reference these constants instead of
//! defining their own magic numbers. When adding new constants, place them
//! in the appropriate section and document the rationale for the value.

// =============================================================================
// CONTAINER FORMAT
// =============================================================================

/// Extension token identifying a certificate container.
///
/// Both the remote drive's metadata query and the local scan filter on this
/// exact token, so it must never change once containers exist in the wild.
pub const CONTAINER_EXTENSION: &str = "cert";

/// Name of the metadata part inside a container bundle.
pub const METADATA_PART: &str = "metadata.json";

/// Name of the payload part inside a container bundle.
pub const PAYLOAD_PART: &str = "payload.bin";

/// Suffix for the sibling staging directory used during container writes.
pub const STAGING_SUFFIX: &str = "tmp";

/// Suffix for the sibling backup directory that holds the previous bundle
/// while a replacement is renamed into place.
pub const BACKUP_SUFFIX: &str = "old";

// =============================================================================
// STORAGE LAYOUT
// =============================================================================

/// Directory under each backend root that holds certificate containers.
pub const CERTIFICATES_DIR: &str = "Certificates";

/// Persisted index filename, stored at the certificates root of the
/// preferred tier.
pub const INDEX_FILE_NAME: &str = "certvault-index.json";

// =============================================================================
// SYNCHRONIZATION
// =============================================================================

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Default number of candidate paths per discovery batch.
///
/// Small enough to keep the first batch arriving quickly on a cold drive,
/// large enough that a few hundred certificates need only a handful of
/// channel sends.
pub const DISCOVERY_BATCH_SIZE: usize = 64;

/// Default trigger channel depth for the orchestrator run loop.
///
/// Triggers queued beyond the one currently running coalesce into a single
/// follow-up pass, so the depth only needs to absorb bursts.
pub const TRIGGER_CHANNEL_DEPTH: usize = 16;

/// Default cap on simultaneously running document moves in a batch.
pub const MOVE_CONCURRENCY: usize = 4;
