//! Wire shape of one event on the bus (spec §6 "SSE event types").

use serde::Serialize;
use serde_json::Value;

/// One event published on the bus. `event_type()` gives the SSE `event:` line;
/// the full value (including `type`) is also the SSE `data:` payload.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    /// Sent once, immediately on SSE subscribe.
    Connected { ts: String },
    /// Carries the set of dashboard scopes a client should refresh, and why.
    /// Also used as the periodic idle heartbeat (`reason = "heartbeat"`).
    Sync { scope: Vec<String>, reason: String },
    /// One agent-status snapshot row (component 4.C/4.I).
    AgentStatus { snapshot: Value },
    /// Incremental terminal screen chunk for the live viewer (component 4.J).
    Terminal { session_id: String, chunk: String },
    /// Escape hatch for tool/store mutations that don't fit the above shapes
    /// (e.g. `command_card_run`, `audit`, `topology_approval`).
    Custom { scope: String, payload: Value },
}

impl BusEvent {
    /// The SSE `event:` field — the same tag serde uses for `type`.
    pub fn event_type(&self) -> &'static str {
        match self {
            BusEvent::Connected { .. } => "connected",
            BusEvent::Sync { .. } => "sync",
            BusEvent::AgentStatus { .. } => "agent_status",
            BusEvent::Terminal { .. } => "terminal",
            BusEvent::Custom { .. } => "custom",
        }
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Encodes one event as an SSE frame: `id:`, `event:`, `data:` lines
/// terminated by a blank line (spec §4.H).
pub fn sse_encode(id: u64, event: &BusEvent) -> Result<String, serde_json::Error> {
    let data = serde_json::to_string(&event.to_value()?)?;
    Ok(format!(
        "id: {}\nevent: {}\ndata: {}\n\n",
        id,
        event.event_type(),
        data
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_encode_has_id_event_data_and_blank_line() {
        let ev = BusEvent::Connected {
            ts: "2026-07-31T00:00:00Z".to_string(),
        };
        let frame = sse_encode(7, &ev).unwrap();
        assert!(frame.starts_with("id: 7\n"));
        assert!(frame.contains("event: connected\n"));
        assert!(frame.contains("data: {"));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn sync_event_type_is_sync() {
        let ev = BusEvent::Sync {
            scope: vec!["audit".to_string()],
            reason: "heartbeat".to_string(),
        };
        assert_eq!(ev.event_type(), "sync");
    }
}
