//! `GET /api/task-acks`, `/api/task-dags`, `/api/task-traces`,
//! `/api/task-traces/spans` (spec §6).

use axum::extract::Query;
use axum::http::StatusCode;
use axum::Json;
use orch_core::task_extras::{list_task_acks, list_task_dags, list_task_trace_spans, list_task_traces};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::response::ok_json;

#[derive(Debug, Deserialize, Default)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

pub async fn task_acks(Query(q): Query<LimitQuery>) -> (StatusCode, Json<Value>) {
    match list_task_acks(q.limit) {
        Ok(rows) => (StatusCode::OK, ok_json(json!({ "task_acks": rows }))),
        Err(e) => (e.http_status(), Json(e.tool_envelope())),
    }
}

pub async fn task_dags(Query(q): Query<LimitQuery>) -> (StatusCode, Json<Value>) {
    match list_task_dags(q.limit) {
        Ok(rows) => (StatusCode::OK, ok_json(json!({ "task_dags": rows }))),
        Err(e) => (e.http_status(), Json(e.tool_envelope())),
    }
}

pub async fn task_traces(Query(q): Query<LimitQuery>) -> (StatusCode, Json<Value>) {
    match list_task_traces(q.limit) {
        Ok(rows) => (StatusCode::OK, ok_json(json!({ "task_traces": rows }))),
        Err(e) => (e.http_status(), Json(e.tool_envelope())),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct SpansQuery {
    pub trace_id: Option<String>,
}

pub async fn task_trace_spans(Query(q): Query<SpansQuery>) -> (StatusCode, Json<Value>) {
    match list_task_trace_spans(q.trace_id.as_deref()) {
        Ok(rows) => (StatusCode::OK, ok_json(json!({ "spans": rows }))),
        Err(e) => (e.http_status(), Json(e.tool_envelope())),
    }
}
