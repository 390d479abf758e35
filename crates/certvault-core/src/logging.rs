//! Structured logging schema and field name constants for certvault.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Persist or move failure the user will be told about |
//! | WARN  | Recoverable issue, automatic fallback applied (local-only pass, skipped container) |
//! | INFO  | Lifecycle events (pass start/finish, moves), operation completions |
//! | DEBUG | Decision points, per-container skips, event emission |
//! | TRACE | Per-item iteration during scan and discovery |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "store", "discovery", "sync"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "reconcile", "scan", "persist", "move_document"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Activity UUID a document belongs to.
pub const ASSIGNED_OBJECT_ID: &str = "assigned_object_id";

/// Media kind of the document being operated on.
pub const MEDIA_KIND: &str = "media_kind";

/// Container path in play.
pub const LOCATION: &str = "location";

/// Storage tier ("local" or "remote").
pub const TIER: &str = "tier";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Containers seen by a scan or discovery pass.
pub const SEEN: &str = "seen";

/// Containers that failed to decode in a pass.
pub const UNREADABLE: &str = "unreadable";

/// Records added by a reconciliation pass.
pub const ADDED: &str = "added";

/// Records removed by a reconciliation pass.
pub const REMOVED: &str = "removed";

/// Committed records after a pass.
pub const TOTAL: &str = "total";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Whether the remote backend answered this pass.
pub const REMOTE_AVAILABLE: &str = "remote_available";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
