//! `/`, `GET /health`, `GET /ready` (spec §4.L, §6).

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use serde_json::json;

use crate::response::ok_json;
use crate::state::AppState;

pub async fn index_page() -> Html<&'static str> {
    Html(
        "<!doctype html><html><head><title>orchestration bus</title></head>\
         <body><h1>orchestration bus dashboard</h1>\
         <p>See <code>/api/*</code> for the JSON surface and \
         <code>/api/events/stream</code> for live updates.</p></body></html>",
    )
}

/// Never touches the DB (spec: "liveness").
pub async fn health() -> axum::Json<serde_json::Value> {
    ok_json(json!({ "status": "live", "ts": orch_core::common::now_utc().to_rfc3339() }))
}

pub async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, axum::Json<serde_json::Value>) {
    let start = Instant::now();
    let result = sqlx::query("SELECT 1").execute(&state.pool).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(_) => (
            StatusCode::OK,
            ok_json(json!({ "status": "ready", "ts": orch_core::common::now_utc().to_rfc3339(), "db_latency_ms": latency_ms })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(json!({ "ok": false, "status": "not_ready", "error": e.to_string() })),
        ),
    }
}
