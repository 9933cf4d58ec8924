//! `GET /api/audit`, `/api/system-log`, `/api/ai-log`, and their
//! newline-delimited-JSON `/export` variants (spec §6).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use orch_core::audit::{query_events, QueryEvents};
use orch_core::system_log::{query_ai_logs, query_system_logs, QuerySystemLog};
use serde::Deserialize;
use serde_json::json;

use crate::response::ok_json;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct AuditQuery {
    pub limit: Option<i64>,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub actor: String,
    #[serde(default)]
    pub keyword: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct LogQuery {
    pub limit: Option<i64>,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub logger: String,
    #[serde(default)]
    pub keyword: String,
}

pub async fn get_audit(
    State(state): State<Arc<AppState>>,
    Query(q): Query<AuditQuery>,
) -> (StatusCode, Json<serde_json::Value>) {
    let query = QueryEvents {
        limit: q.limit,
        event_type: q.event_type,
        action: q.action,
        result: q.result,
        actor: q.actor,
        keyword: q.keyword,
    };
    match query_events(&state.pool, query).await {
        Ok(events) => (StatusCode::OK, ok_json(json!({ "events": events }))),
        Err(e) => (e.http_status(), Json(e.tool_envelope())),
    }
}

pub async fn get_system_log(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LogQuery>,
) -> (StatusCode, Json<serde_json::Value>) {
    let query = QuerySystemLog { limit: q.limit, level: q.level, logger: q.logger, keyword: q.keyword };
    match query_system_logs(&state.pool, query).await {
        Ok(rows) => (StatusCode::OK, ok_json(json!({ "logs": rows }))),
        Err(e) => (e.http_status(), Json(e.tool_envelope())),
    }
}

pub async fn get_ai_log(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LogQuery>,
) -> (StatusCode, Json<serde_json::Value>) {
    let query = QuerySystemLog { limit: q.limit, level: q.level, logger: q.logger, keyword: q.keyword };
    match query_ai_logs(&state.pool, query).await {
        Ok(rows) => (StatusCode::OK, ok_json(json!({ "logs": rows }))),
        Err(e) => (e.http_status(), Json(e.tool_envelope())),
    }
}

fn ndjson_response(filename: &str, lines: Vec<String>) -> impl IntoResponse {
    let body = lines.join("\n");
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/x-ndjson"));
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    (StatusCode::OK, headers, body)
}

pub async fn export_system_log(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LogQuery>,
) -> axum::response::Response {
    let query = QuerySystemLog { limit: q.limit, level: q.level, logger: q.logger, keyword: q.keyword };
    match query_system_logs(&state.pool, query).await {
        Ok(rows) => {
            let lines = rows.into_iter().filter_map(|r| serde_json::to_string(&r).ok()).collect();
            let ts = orch_core::common::now_utc().format("%Y%m%d-%H%M%S").to_string();
            ndjson_response(&format!("system-log-{ts}.ndjson"), lines).into_response()
        }
        Err(e) => (e.http_status(), Json(e.tool_envelope())).into_response(),
    }
}

pub async fn export_ai_log(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LogQuery>,
) -> axum::response::Response {
    let query = QuerySystemLog { limit: q.limit, level: q.level, logger: q.logger, keyword: q.keyword };
    match query_ai_logs(&state.pool, query).await {
        Ok(rows) => {
            let lines = rows.into_iter().filter_map(|r| serde_json::to_string(&r).ok()).collect();
            let ts = orch_core::common::now_utc().format("%Y%m%d-%H%M%S").to_string();
            ndjson_response(&format!("ai-log-{ts}.ndjson"), lines).into_response()
        }
        Err(e) => (e.http_status(), Json(e.tool_envelope())).into_response(),
    }
}
