use serde_json::Value;

use crate::utility::get_system_time_ms;

pub struct EventQueue {
    // Events to publish
    _events: Vec<Value>,
}

impl EventQueue {
    /// Create a new instance of the event queue.
    ///
    /// # Returns
    /// New instance of the event queue.
    pub fn new() -> Self {
        Self {
            _events: Vec::new(),
        }
    }

    /// Check if there are any events to publish.
    ///
    /// # Returns
    /// True if there are events to publish, false otherwise.
    pub fn has_event(&self) -> bool {
        !self._events.is_empty()
    }

    /// Add an event. The event is stamped with the system time in
    /// milliseconds so the operators see cause and effect alongside the
    /// telemetry.
    ///
    /// # Arguments
    /// * `event` - Event message.
    pub fn add_event(&mut self, mut event: Value) {
        if let Some(object) = event.as_object_mut() {
            object.insert(String::from("timestamp"), Value::from(get_system_time_ms()));
        }

        self._events.push(event);
    }

    /// Get the events to publish and clear the internal events.
    ///
    /// # Returns
    /// Events.
    pub fn get_events_and_clear(&mut self) -> Vec<Value> {
        let events = self._events.clone();
        self._events.clear();

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_has_event() {
        let mut event_queue = EventQueue::new();

        assert!(!event_queue.has_event());

        let event = json!({
            "id": "test",
        });
        event_queue.add_event(event);

        assert!(event_queue.has_event());
    }

    #[test]
    fn test_add_event_stamps_timestamp() {
        let mut event_queue = EventQueue::new();

        event_queue.add_event(json!({
            "id": "test",
        }));

        let events = event_queue.get_events_and_clear();

        assert_eq!(events[0]["id"], "test");
        assert!(events[0]["timestamp"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_get_events_and_clear() {
        let mut event_queue = EventQueue::new();

        let event = json!({
            "id": "test",
        });
        event_queue.add_event(event);

        let events = event_queue.get_events_and_clear();

        assert_eq!(events.len(), 1);
        assert!(!event_queue.has_event());
    }
}
