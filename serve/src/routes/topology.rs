//! `GET /api/topology/approvals`, `POST /api/topology/approvals/<16-hex>/approve|reject`
//! (spec §6): id strictly 16 lowercase hex, otherwise 400.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use orch_core::topology::{
    approve_approval, is_valid_approval_id, list_approvals as list_approvals_store, reject_approval,
};
use orch_core::BusError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::response::ok_json;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct ListApprovalsQuery {
    #[serde(default)]
    pub status: String,
    pub limit: Option<i64>,
}

pub async fn list_approvals(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListApprovalsQuery>,
) -> (StatusCode, Json<Value>) {
    match list_approvals_store(&state.pool, &q.status, q.limit).await {
        Ok(rows) => (StatusCode::OK, ok_json(json!({ "approvals": rows }))),
        Err(e) => (e.http_status(), Json(e.tool_envelope())),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct DecisionBody {
    #[serde(default)]
    pub reviewer: String,
    #[serde(default)]
    pub note: String,
}

fn bad_id(approval_id: &str) -> (StatusCode, Json<Value>) {
    let e = BusError::Validation(format!("approval id must be 16 lowercase hex characters: {approval_id}"));
    (e.http_status(), Json(e.tool_envelope()))
}

pub async fn approve(
    State(state): State<Arc<AppState>>,
    Path(approval_id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> (StatusCode, Json<Value>) {
    if !is_valid_approval_id(&approval_id) {
        return bad_id(&approval_id);
    }
    match approve_approval(&state.pool, &approval_id, &body.reviewer, &body.note).await {
        Ok(outcome) => (StatusCode::OK, ok_json(serde_json::to_value(&outcome).unwrap_or(json!({})))),
        Err(e) => (e.http_status(), Json(e.tool_envelope())),
    }
}

pub async fn reject(
    State(state): State<Arc<AppState>>,
    Path(approval_id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> (StatusCode, Json<Value>) {
    if !is_valid_approval_id(&approval_id) {
        return bad_id(&approval_id);
    }
    match reject_approval(&state.pool, &approval_id, &body.reviewer, &body.note).await {
        Ok(outcome) => (StatusCode::OK, ok_json(serde_json::to_value(&outcome).unwrap_or(json!({})))),
        Err(e) => (e.http_status(), Json(e.tool_envelope())),
    }
}
