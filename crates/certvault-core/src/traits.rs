//! Core traits for certvault abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable collaborators and testability.

use async_trait::async_trait;
use uuid::Uuid;

// =============================================================================
// ACTIVITY DIRECTORY
// =============================================================================

/// Read-only lookup into the activity domain model.
///
/// The sync core names per-activity folders after the activity that earned
/// the certificate. The lookup is best-effort: a `None` answer (activity
/// deleted, domain store unavailable) falls back to a timestamp-derived
/// flat name, never an error.
#[async_trait]
pub trait ActivityDirectory: Send + Sync {
    /// Human-readable name of the activity, if it still exists.
    async fn activity_name(&self, assigned_object_id: Uuid) -> Option<String>;
}

/// Directory that knows no activities. Used when the domain store is not
/// wired up (widget processes, tests); every save falls back to flat
/// timestamp naming.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoActivityDirectory;

#[async_trait]
impl ActivityDirectory for NoActivityDirectory {
    async fn activity_name(&self, _assigned_object_id: Uuid) -> Option<String> {
        None
    }
}
