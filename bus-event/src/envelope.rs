//! Envelope (session_id, event_id) carried on every bus event.
//! `EnvelopeState` assigns the monotonic `event_id` under a single counter,
//! matching the ordering guarantee of spec §5 ("event-bus ids are
//! monotonically increasing and assigned under a mutex").

use crate::event::BusEvent;
use serde_json::Value;

/// Envelope fields merged into every published event.
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    /// Bus/session identifier; constant for the life of the process.
    pub session_id: Option<String>,
    /// Per-event sequence number; monotonically increasing within the bus.
    pub event_id: Option<u64>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn with_event_id(mut self, id: u64) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Merges envelope fields into the given JSON object (top-level only).
    /// Does not overwrite existing keys.
    pub fn inject_into(&self, obj: &mut Value) {
        let Some(obj) = obj.as_object_mut() else {
            return;
        };
        if let Some(ref id) = self.session_id {
            obj.entry("session_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(id) = self.event_id {
            obj.entry("event_id")
                .or_insert_with(|| Value::Number(serde_json::Number::from(id)));
        }
    }
}

/// Monotonic event-id allocator for one bus. The mutex guarding this state
/// lives in [`crate::bus::EventBus`]; this struct is the pure counter.
pub struct EnvelopeState {
    pub session_id: String,
    pub next_event_id: u64,
}

impl EnvelopeState {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            next_event_id: 1,
        }
    }

    /// Injects the envelope into the event value and advances the counter.
    pub fn inject_into(&mut self, value: &mut Value) {
        let env = Envelope::new()
            .with_session_id(&self.session_id)
            .with_event_id(self.next_event_id);
        self.next_event_id += 1;
        env.inject_into(value);
    }

    /// Allocates the next event id without mutating the value (used by the
    /// bus to stamp the id used in the SSE `id:` line as well as the body).
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_event_id;
        self.next_event_id += 1;
        id
    }
}

/// Converts a bus event to JSON and injects the envelope using the given state.
pub fn to_json(event: &BusEvent, state: &mut EnvelopeState) -> Result<Value, serde_json::Error> {
    let mut value = event.to_value()?;
    state.inject_into(&mut value);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::BusEvent;

    #[test]
    fn envelope_inject() {
        let mut obj = serde_json::json!({"type":"connected"});
        let env = Envelope::new().with_session_id("sess-1").with_event_id(1);
        env.inject_into(&mut obj);
        assert_eq!(obj["session_id"], "sess-1");
        assert_eq!(obj["event_id"], 1);
        assert_eq!(obj["type"], "connected");
    }

    #[test]
    fn to_json_injects_envelope_and_advances_counter() {
        let ev = BusEvent::Connected {
            ts: "now".to_string(),
        };
        let mut state = EnvelopeState::new("bus-1".to_string());
        let first = to_json(&ev, &mut state).unwrap();
        let second = to_json(&ev, &mut state).unwrap();
        assert_eq!(first["event_id"], 1);
        assert_eq!(second["event_id"], 2);
        assert_eq!(first["session_id"], "bus-1");
    }
}
