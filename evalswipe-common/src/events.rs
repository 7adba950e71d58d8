//! Review event system
//!
//! Provides the ReviewEvent definitions and the EventBus the session manager
//! publishes to. Presentation layers subscribe to keep their view in sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Verdict label carried in events (`pass`, `fail` or `defer`)
pub type VerdictLabel = String;

/// EvalSwipe event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReviewEvent {
    /// A new session was created through the backend
    SessionStarted {
        session_id: String,
        name: String,
        total_traces: usize,
        timestamp: DateTime<Utc>,
    },

    /// A checkpointed session was loaded from the durable store
    SessionRestored {
        session_id: String,
        current_index: usize,
        timestamp: DateTime<Utc>,
    },

    /// In-memory session and checkpoint were discarded
    SessionCleared { timestamp: DateTime<Utc> },

    /// A decision was persisted and applied to a trace
    TraceAnnotated {
        trace_id: String,
        trace_index: usize,
        verdict: VerdictLabel,
        reviewed: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// The most recent decision was reverted locally
    DecisionUndone {
        trace_id: String,
        trace_index: usize,
        timestamp: DateTime<Utc>,
    },

    /// Navigation moved the cursor (index may equal the trace count at end of list)
    CurrentTraceChanged {
        trace_index: usize,
        trace_id: Option<String>,
    },

    /// No unreviewed trace remains after the cursor
    ReviewComplete { reviewed: usize, total: usize },

    /// A tag was created through the backend and registered locally
    TagCreated { tag_id: String, name: String },

    /// Writing the session checkpoint failed; in-memory state is unaffected
    CheckpointFailed { message: String },
}

impl ReviewEvent {
    /// One-line message for the reviewer, for events worth surfacing
    ///
    /// Routine cursor and annotation updates return `None`; the view already
    /// shows them.
    pub fn notice(&self) -> Option<String> {
        match self {
            ReviewEvent::SessionRestored { current_index, .. } => Some(format!(
                "Session restored from previous session (trace {})",
                current_index + 1
            )),
            ReviewEvent::ReviewComplete { reviewed, total } => Some(format!(
                "Review complete: {} of {} traces reviewed",
                reviewed, total
            )),
            ReviewEvent::CheckpointFailed { message } => {
                Some(format!("Warning: session not saved locally: {}", message))
            }
            _ => None,
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally, so a slow subscriber lags instead of
/// blocking the engine.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReviewEvent>,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ReviewEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ReviewEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::new(10);
        bus.emit_lossy(ReviewEvent::SessionCleared {
            timestamp: Utc::now(),
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit_lossy(ReviewEvent::TagCreated {
            tag_id: "tag_1".to_string(),
            name: "Hallucination".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            ReviewEvent::TagCreated {
                tag_id: "tag_1".to_string(),
                name: "Hallucination".to_string(),
            }
        );
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ReviewEvent::ReviewComplete {
            reviewed: 3,
            total: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ReviewComplete");
        assert_eq!(json["reviewed"], 3);
    }

    #[test]
    fn test_notices_for_reviewer_facing_events() {
        let failed = ReviewEvent::CheckpointFailed {
            message: "database is locked".to_string(),
        };
        assert_eq!(
            failed.notice().as_deref(),
            Some("Warning: session not saved locally: database is locked")
        );

        let restored = ReviewEvent::SessionRestored {
            session_id: "session_1".to_string(),
            current_index: 2,
            timestamp: Utc::now(),
        };
        assert!(restored.notice().unwrap().contains("trace 3"));

        let moved = ReviewEvent::CurrentTraceChanged {
            trace_index: 1,
            trace_id: Some("t1".to_string()),
        };
        assert_eq!(moved.notice(), None);
    }
}
