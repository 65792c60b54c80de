//! Note lifecycle events and the broadcast bus that carries them.
//!
//! Views subscribe and re-render from [`crate::NoteService::snapshot`] when
//! an event arrives; events carry keys, not note bodies.

use serde::Serialize;
use tokio::sync::broadcast;

use messy_core::{NoteId, TempId};

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum NoteEvent {
    /// A processing placeholder was inserted at the head.
    PlaceholderInserted { temp_id: TempId, kind: &'static str },
    /// A placeholder was replaced by the server's note.
    Reconciled {
        temp_id: TempId,
        note_id: Option<NoteId>,
    },
    /// A create settled with no matching placeholder; the note was appended.
    Appended {
        temp_id: TempId,
        note_id: Option<NoteId>,
    },
    /// A create failed; the placeholder is kept for retry or discard.
    CreateFailed { temp_id: TempId, error: String },
    /// A failed placeholder was resubmitted.
    Retrying { temp_id: TempId },
    /// A placeholder was discarded by the user.
    Discarded { temp_id: TempId },
    /// A note edit was confirmed.
    Updated { note_id: NoteId },
    /// A note was deleted.
    Removed { note_id: NoteId },
    /// The collection was replaced by a fresh listing.
    Refreshed { count: usize },
}

impl NoteEvent {
    /// Namespaced event type (e.g. `"note.reconciled"`).
    pub fn event_type(&self) -> &'static str {
        match self {
            NoteEvent::PlaceholderInserted { .. } => "note.placeholder_inserted",
            NoteEvent::Reconciled { .. } => "note.reconciled",
            NoteEvent::Appended { .. } => "note.appended",
            NoteEvent::CreateFailed { .. } => "note.create_failed",
            NoteEvent::Retrying { .. } => "note.retrying",
            NoteEvent::Discarded { .. } => "note.discarded",
            NoteEvent::Updated { .. } => "note.updated",
            NoteEvent::Removed { .. } => "note.removed",
            NoteEvent::Refreshed { .. } => "notes.refreshed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel for [`NoteEvent`]s. Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<NoteEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Dropped silently when nobody listens.
    pub fn emit(&self, event: NoteEvent) {
        tracing::debug!(
            event_type = event.event_type(),
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(event);
    }

    /// Each subscriber gets its own independent stream.
    pub fn subscribe(&self) -> broadcast::Receiver<NoteEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(messy_core::defaults::EVENT_BUS_CAPACITY)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let temp_id = TempId::generate();
        assert_eq!(
            NoteEvent::PlaceholderInserted {
                temp_id,
                kind: "text"
            }
            .event_type(),
            "note.placeholder_inserted"
        );
        assert_eq!(
            NoteEvent::Refreshed { count: 3 }.event_type(),
            "notes.refreshed"
        );
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = NoteEvent::Removed {
            note_id: NoteId::new("n1"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Removed");
        assert_eq!(json["note_id"], "n1");
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(NoteEvent::Refreshed { count: 2 });

        assert_eq!(a.recv().await.unwrap(), NoteEvent::Refreshed { count: 2 });
        assert_eq!(b.recv().await.unwrap(), NoteEvent::Refreshed { count: 2 });
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::default();
        bus.emit(NoteEvent::Refreshed { count: 0 });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
