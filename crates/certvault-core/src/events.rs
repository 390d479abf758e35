//! Completion events and event bus for synchronization notifications.
//!
//! The orchestrator announces finished work (a reconciliation pass, a save,
//! a delete) on a single broadcast channel. Downstream consumers (UI layers,
//! widget refresh, telemetry) subscribe independently. Events are
//! fire-and-forget: nothing in the core waits on a subscriber.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::MediaKind;

// ============================================================================
// Sync Events
// ============================================================================

/// Completion signals emitted by the synchronization core.
///
/// Serialized as JSON with a `type` tag field, e.g.
/// `{"type":"SaveCompleted","assigned_object_id":"...","media_kind":"image"}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    /// A reconciliation pass finished and the index was persisted.
    SyncCompleted {
        total_records: usize,
        added: usize,
        removed: usize,
        unreadable: usize,
        remote_available: bool,
    },
    /// A document was written and its record committed.
    SaveCompleted {
        assigned_object_id: Uuid,
        media_kind: MediaKind,
        location: String,
    },
    /// A document was removed along with its record.
    DeleteCompleted {
        assigned_object_id: Uuid,
        media_kind: MediaKind,
    },
}

impl SyncEvent {
    /// Variant name, used for subscriber filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::SyncCompleted { .. } => "SyncCompleted",
            SyncEvent::SaveCompleted { .. } => "SaveCompleted",
            SyncEvent::DeleteCompleted { .. } => "DeleteCompleted",
        }
    }

    /// Dot-namespaced event type for log correlation.
    pub fn namespaced_event_type(&self) -> &'static str {
        match self {
            SyncEvent::SyncCompleted { .. } => "sync.completed",
            SyncEvent::SaveCompleted { .. } => "save.completed",
            SyncEvent::DeleteCompleted { .. } => "delete.completed",
        }
    }

    /// The activity this event relates to, when it concerns one document.
    pub fn assigned_object_id(&self) -> Option<Uuid> {
        match self {
            SyncEvent::SyncCompleted { .. } => None,
            SyncEvent::SaveCompleted {
                assigned_object_id, ..
            }
            | SyncEvent::DeleteCompleted {
                assigned_object_id, ..
            } => Some(*assigned_object_id),
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast-based event bus for distributing completion signals.
///
/// Uses `tokio::sync::broadcast` with a configurable buffer size. Slow
/// receivers that fall behind receive a `Lagged` error and miss events;
/// consumers that need completeness should read the index instead.
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    ///
    /// Recommended: 256 for production, 32 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. If there are no active subscribers,
    /// the event is silently dropped.
    pub fn emit(&self, event: SyncEvent) {
        let subscriber_count = self.tx.receiver_count();
        tracing::debug!(
            event_type = %event.namespaced_event_type(),
            subscriber_count,
            "EventBus emit"
        );
        let _ = self.tx.send(event);
    }

    /// Subscribe to events. Each subscriber gets its own independent stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ============================================================================
// Tests
// ============================================================================
