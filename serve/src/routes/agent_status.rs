//! `GET /api/agent-status?lines=<n>` (spec §6).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use orch_core::agent_status::{query_agent_status, QueryAgentStatus};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct AgentStatusQuery {
    pub lines: Option<i64>,
    pub agent_id: Option<String>,
    pub status: Option<String>,
}

fn summarize(agents: &[orch_core::agent_status::AgentStatus]) -> Value {
    let mut summary = serde_json::Map::new();
    summary.insert("total".to_string(), json!(agents.len()));
    let healthy = agents.iter().filter(|a| a.status == "running" || a.status == "idle").count();
    summary.insert("healthy".to_string(), json!(healthy));
    summary.insert("unhealthy".to_string(), json!(agents.len() - healthy));
    for name in ["running", "idle", "stuck", "error", "disconnected", "unknown"] {
        let count = agents.iter().filter(|a| a.status == name).count();
        summary.insert(name.to_string(), json!(count));
    }
    Value::Object(summary)
}

pub async fn get_agent_status(
    State(state): State<Arc<AppState>>,
    Query(q): Query<AgentStatusQuery>,
) -> (StatusCode, Json<Value>) {
    let query = QueryAgentStatus {
        agent_id: q.agent_id,
        status: q.status,
        limit: q.lines,
    };
    match query_agent_status(&state.pool, query).await {
        Ok(agents) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "ts": orch_core::common::now_utc().to_rfc3339(),
                "summary": summarize(&agents),
                "agents": agents,
            })),
        ),
        Err(e) => (e.http_status(), Json(e.tool_envelope())),
    }
}
