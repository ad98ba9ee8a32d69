//! Telemetry sink that records events for assertions.

use parking_lot::Mutex;

use crate::port::{EngineEvent, Telemetry};

/// Keeps every emitted [`EngineEvent`] in order.
#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    /// Number of events with the given [`EngineEvent::name`].
    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.name() == name)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Telemetry for RecordingTelemetry {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}
