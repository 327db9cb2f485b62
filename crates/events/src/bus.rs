//! Fan-out of recovery notifications over a `tokio::sync::broadcast` channel.
//!
//! The coordinator publishes [`PlatformEvent`]s on an [`EventBus`] shared as
//! `Arc<EventBus>`; UI and audit collaborators each hold their own receiver.

use chrono::{DateTime, Utc};
use lyra_core::recovery::RecoverySummary;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::event_types;

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// Envelope for one notification.
///
/// Start from [`PlatformEvent::new`] or one of the typed constructors, then
/// chain [`with_source`](PlatformEvent::with_source) and
/// [`with_payload`](PlatformEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// One of the names in [`event_types`].
    pub event_type: String,

    /// Kind of entity the event is about, e.g. `"checkpoint"`.
    pub source_entity_type: Option<String>,

    /// Id of that entity.
    pub source_entity_id: Option<String>,

    /// Event-specific JSON object.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    /// Bare event of `event_type` with no source and an empty payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity_type: None,
            source_entity_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Summary of a startup recovery pass.
    ///
    /// Payload keys: `resumed_count`, `cleaned_count`, `failed_count`,
    /// `dead_letter_count`, `duration_ms`.
    pub fn recovery_completed(summary: &RecoverySummary) -> Self {
        Self::new(event_types::RECOVERY_COMPLETED).with_payload(serde_json::json!({
            "resumed_count": summary.resumed,
            "cleaned_count": summary.cleaned,
            "failed_count": summary.failed,
            "dead_letter_count": summary.dead_lettered,
            "duration_ms": summary.duration_ms,
        }))
    }

    /// A checkpoint was quarantined; sourced from the checkpoint id.
    pub fn checkpoint_dead_lettered(
        checkpoint_id: impl Into<String>,
        operation_type: &str,
        target_path: &str,
        failure_count: i32,
    ) -> Self {
        Self::new(event_types::CHECKPOINT_DEAD_LETTERED)
            .with_source("checkpoint", checkpoint_id)
            .with_payload(serde_json::json!({
                "operation_type": operation_type,
                "target_path": target_path,
                "failure_count": failure_count,
            }))
    }

    pub fn with_source(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_id = Some(entity_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Events buffered per receiver before the slowest one starts lagging.
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast hub: every receiver sees every event published after it
/// subscribed.
///
/// ```rust
/// use lyra_events::bus::{EventBus, PlatformEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PlatformEvent::new("recovery.completed"));
/// assert_eq!(rx.try_recv().unwrap().event_type, "recovery.completed");
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Bus buffering up to `capacity` events. A receiver that falls further
    /// behind gets `RecvError::Lagged` and loses the oldest events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Deliver `event` to current subscribers. Dropped if there are none.
    pub fn publish(&self, event: PlatformEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            tracing::debug!(event_type = %event.event_type, "No subscribers for event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dead_letter_event_reaches_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(PlatformEvent::checkpoint_dead_lettered(
            "cp-42",
            "tag_write",
            "/music/a.flac",
            3,
        ));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, event_types::CHECKPOINT_DEAD_LETTERED);
        assert_eq!(received.source_entity_type.as_deref(), Some("checkpoint"));
        assert_eq!(received.source_entity_id.as_deref(), Some("cp-42"));
        assert_eq!(received.payload["operation_type"], "tag_write");
        assert_eq!(received.payload["failure_count"], 3);
    }

    #[tokio::test]
    async fn summary_fans_out_to_ui_and_audit_receivers() {
        let bus = EventBus::default();
        let mut ui = bus.subscribe();
        let mut audit = bus.subscribe();

        bus.publish(PlatformEvent::recovery_completed(&RecoverySummary::default()));

        assert_eq!(ui.recv().await.unwrap().event_type, event_types::RECOVERY_COMPLETED);
        assert_eq!(audit.recv().await.unwrap().event_type, event_types::RECOVERY_COMPLETED);
    }

    #[test]
    fn summary_published_before_anyone_listens_is_dropped() {
        let bus = EventBus::default();
        bus.publish(PlatformEvent::recovery_completed(&RecoverySummary::default()));

        let mut late = bus.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn recovery_event_carries_summary_counts() {
        let summary = RecoverySummary {
            resumed: 2,
            cleaned: 1,
            failed: 3,
            dead_lettered: 1,
            duration_ms: 40,
            ..Default::default()
        };
        let event = PlatformEvent::recovery_completed(&summary);

        assert_eq!(event.event_type, event_types::RECOVERY_COMPLETED);
        assert_eq!(event.payload["resumed_count"], 2);
        assert_eq!(event.payload["cleaned_count"], 1);
        assert_eq!(event.payload["failed_count"], 3);
        assert_eq!(event.payload["dead_letter_count"], 1);
        assert_eq!(event.payload["duration_ms"], 40);
    }
}
