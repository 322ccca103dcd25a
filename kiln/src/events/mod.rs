//! Event sink system for observability.
//!
//! Pipeline lifecycle events flow through an [`EventSink`]; the default
//! global sink discards them unless one is configured.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use parking_lot::RwLock;
use std::sync::Arc;

static GLOBAL_EVENT_SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

/// Sets the current global event sink.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    *GLOBAL_EVENT_SINK.write() = Some(sink);
}

/// Clears the current global event sink.
pub fn clear_event_sink() {
    *GLOBAL_EVENT_SINK.write() = None;
}

/// Gets the current global event sink.
///
/// Returns a `NoOpEventSink` if no sink is set.
#[must_use]
pub fn get_event_sink() -> Arc<dyn EventSink> {
    GLOBAL_EVENT_SINK
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NoOpEventSink))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_sink_roundtrip() {
        let sink = Arc::new(CollectingEventSink::new());
        set_event_sink(sink.clone());

        // Other tests may emit through the global sink concurrently, so
        // assert only on this test's own event type.
        get_event_sink().try_emit("events.roundtrip.check", None);
        assert_eq!(sink.events_of_type("events.roundtrip.").len(), 1);

        clear_event_sink();
        // Falls back to no-op without panicking
        get_event_sink().try_emit("events.roundtrip.check", None);
        assert_eq!(sink.events_of_type("events.roundtrip.").len(), 1);
    }
}
