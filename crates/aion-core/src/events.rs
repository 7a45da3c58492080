use crate::collaborators::{Event, EventSink};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// Captures every emitted event (for assertions in tests) and rebroadcasts
/// it on a channel observers can subscribe to.
pub struct InMemoryEventSink {
    captured: Mutex<Vec<Event>>,
    sender: broadcast::Sender<Event>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(1024);
        Self {
            captured: Mutex::new(Vec::new()),
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn captured(&self) -> Vec<Event> {
        self.captured.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.captured.lock().unwrap().clear();
    }
}

impl Default for InMemoryEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for InMemoryEventSink {
    fn emit(&self, event: Event) {
        debug!(?event, "event captured");
        self.captured.lock().unwrap().push(event.clone());
        // No subscriber is not an error: the sink's job is to capture, not guarantee delivery.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn captures_events_in_emission_order() {
        let sink = InMemoryEventSink::new();
        sink.emit(Event::ExperimentStart { experiment_id: "e1".into(), timestamp: Utc::now() });
        sink.emit(Event::UserAssignment {
            experiment_id: "e1".into(),
            user_id: "u1".into(),
            variant_id: "a".into(),
            timestamp: Utc::now(),
        });

        let captured = sink.captured();
        assert_eq!(captured.len(), 2);
        assert!(matches!(captured[0], Event::ExperimentStart { .. }));
        assert!(matches!(captured[1], Event::UserAssignment { .. }));
    }
}
