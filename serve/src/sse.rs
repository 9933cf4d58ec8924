//! `GET /api/events/stream` (spec §4.L): subscribes to the event bus,
//! immediately emits `connected` + one seeded `agent_status` snapshot, then
//! forwards published events; emits a periodic heartbeat on idle.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use bus_event::BusEvent;
use futures::stream::{self, Stream, StreamExt};
use orch_core::agent_status::{query_agent_status, QueryAgentStatus};
use serde_json::json;
use tokio_stream::wrappers::IntervalStream;

use crate::state::AppState;

const SYNC_HEARTBEAT_SEC: u64 = 15;

fn to_sse_event(ev: &BusEvent) -> Event {
    let data = ev
        .to_value()
        .unwrap_or_else(|_| json!({"type": "custom", "scope": "encode_error", "payload": {}}));
    Event::default()
        .event(ev.event_type())
        .json_data(data)
        .unwrap_or_else(|_| Event::default().data("{}"))
}

/// Wraps a live [`bus_event::Subscriber`] as a `Stream` of SSE events;
/// ends when the bus drops the subscriber (process shutdown).
fn forward_subscriber(sub: bus_event::Subscriber) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(sub, |mut sub| async move {
        let (_, event) = sub.recv().await?;
        Some((Ok(to_sse_event(&event)), sub))
    })
}

pub async fn stream_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let sub = state.bus.subscribe();

    let connected = BusEvent::Connected { ts: orch_core::common::now_utc().to_rfc3339() };
    let seeded_snapshot = query_agent_status(&state.pool, QueryAgentStatus::default())
        .await
        .map(|rows| json!({ "agents": rows }))
        .unwrap_or_else(|_| json!({ "agents": [] }));
    let seeded = BusEvent::AgentStatus { snapshot: seeded_snapshot };
    let initial = stream::iter(vec![Ok(to_sse_event(&connected)), Ok(to_sse_event(&seeded))]);

    let forwarded = forward_subscriber(sub);

    let heartbeat = IntervalStream::new(tokio::time::interval(Duration::from_secs(SYNC_HEARTBEAT_SEC)))
        .map(|_| Ok(to_sse_event(&BusEvent::Sync { scope: vec![], reason: "heartbeat".to_string() })));

    let merged = initial.chain(stream::select(forwarded, heartbeat));
    Sse::new(merged).keep_alive(KeepAlive::default())
}

/// Periodically re-publishes the agent-status table as an `agent_status`
/// event so open dashboards refresh even when no mutation triggered a
/// publish.
pub fn spawn_agent_status_publisher(state: Arc<AppState>) {
    let tick = Duration::from_secs(config::as_int_env("DASHBOARD_SSE_SYNC_SEC", 10, 1, 3600) as u64);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        loop {
            tokio::select! {
                _ = state.monitor_cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Ok(rows) = query_agent_status(&state.pool, QueryAgentStatus::default()).await {
                        state.bus.publish(BusEvent::AgentStatus { snapshot: json!({ "agents": rows }) });
                    }
                }
            }
        }
    });
}
