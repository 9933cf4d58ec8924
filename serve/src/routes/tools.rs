//! `POST /api/tools/:tool/:action` — generic dashboard-side entry point
//! into the same tool registry the `acp-bus` CLI mode exposes over MCP
//! (spec §4.K).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use orch_core::BusError;
use serde_json::Value;

use crate::state::AppState;

pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Path((tool, action)): Path<(String, String)>,
    Json(args): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let registry = orch_core::tools::registry(state.bridge.clone());
    match registry.into_iter().find(|t| t.name() == tool) {
        Some(t) => {
            let result = t.call(&state.pool, &action, args).await;
            let status = if result.get("ok").and_then(Value::as_bool) == Some(false) {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::OK
            };
            (status, Json(result))
        }
        None => {
            let e = BusError::NotFound(format!("unknown tool: {tool}"));
            (e.http_status(), Json(e.tool_envelope()))
        }
    }
}
