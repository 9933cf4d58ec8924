//! `/api/command-cards*`, `/api/command-card-runs*` (spec §6).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use orch_core::executor::{self, ListCommandCardRuns};
use orch_core::ops_store::{self, ListCommandCards, SaveCommandCard};
use orch_core::BusError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::response::ok_json;
use crate::state::AppState;

fn err_response(e: BusError) -> (StatusCode, Json<Value>) {
    (e.http_status(), Json(e.tool_envelope()))
}

#[derive(Debug, Deserialize, Default)]
pub struct ListCardsQuery {
    pub keyword: Option<String>,
    pub risk_level: Option<String>,
    pub enabled_only: Option<bool>,
    pub limit: Option<i64>,
}

pub async fn list_cards(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListCardsQuery>,
) -> (StatusCode, Json<Value>) {
    let query = ListCommandCards {
        keyword: q.keyword.unwrap_or_default(),
        risk_level: q.risk_level.unwrap_or_default(),
        enabled_only: q.enabled_only.unwrap_or(false),
        limit: q.limit,
    };
    match ops_store::list_command_cards(&state.pool, query).await {
        Ok(cards) => (StatusCode::OK, ok_json(json!({ "command_cards": cards }))),
        Err(e) => err_response(e),
    }
}

pub async fn save_card(
    State(state): State<Arc<AppState>>,
    Json(input): Json<SaveCommandCard>,
) -> (StatusCode, Json<Value>) {
    match ops_store::save_command_card(&state.pool, input).await {
        Ok(card) => (StatusCode::OK, ok_json(json!({ "command_card": card }))),
        Err(e) => err_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ToggleCardBody {
    pub card_key: String,
    pub enabled: bool,
    #[serde(default)]
    pub updated_by: String,
}

pub async fn toggle_card(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ToggleCardBody>,
) -> (StatusCode, Json<Value>) {
    match ops_store::set_command_card_enabled(&state.pool, &body.card_key, body.enabled, &body.updated_by).await {
        Ok(card) => (StatusCode::OK, ok_json(json!({ "command_card": card }))),
        Err(e) => err_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteCardBody {
    pub card_key: String,
    #[serde(default)]
    pub updated_by: String,
}

/// Soft-delete: `ops_store` keeps full version history for every card, so
/// "delete" disables it rather than dropping the row (consistent with the
/// audit trail the version table already provides).
pub async fn delete_card(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteCardBody>,
) -> (StatusCode, Json<Value>) {
    match ops_store::set_command_card_enabled(&state.pool, &body.card_key, false, &body.updated_by).await {
        Ok(card) => (StatusCode::OK, ok_json(json!({ "command_card": card, "deleted": true }))),
        Err(e) => err_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct RollbackCardBody {
    pub card_key: String,
    pub version: i64,
    #[serde(default)]
    pub updated_by: String,
}

pub async fn rollback_card(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RollbackCardBody>,
) -> (StatusCode, Json<Value>) {
    match ops_store::rollback_command_card(&state.pool, &body.card_key, body.version, &body.updated_by).await {
        Ok((card, from_version)) => (StatusCode::OK, ok_json(json!({ "command_card": card, "from_version": from_version }))),
        Err(e) => err_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteCardBody {
    pub card_key: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub requested_by: String,
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default)]
    pub reviewer: String,
    #[serde(default)]
    pub review_note: String,
    pub timeout_sec: Option<i64>,
}

pub async fn execute_card(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExecuteCardBody>,
) -> (StatusCode, Json<Value>) {
    match executor::execute_command_card(
        &state.pool,
        &body.card_key,
        body.params,
        &body.requested_by,
        body.auto_approve,
        &body.reviewer,
        &body.review_note,
        body.timeout_sec,
    )
    .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            ok_json(json!({
                "pending_review": outcome.pending_review,
                "run": outcome.run,
                "interaction": outcome.interaction,
                "message": outcome.message,
            })),
        ),
        Err(e) => err_response(e),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ListRunsQuery {
    pub card_key: Option<String>,
    pub status: Option<String>,
    pub requested_by: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListRunsQuery>,
) -> (StatusCode, Json<Value>) {
    let query = ListCommandCardRuns {
        card_key: q.card_key.unwrap_or_default(),
        status: q.status.unwrap_or_default(),
        requested_by: q.requested_by.unwrap_or_default(),
        limit: q.limit,
    };
    match executor::list_command_card_runs(&state.pool, query).await {
        Ok(runs) => (StatusCode::OK, ok_json(json!({ "runs": runs }))),
        Err(e) => err_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewRunBody {
    pub run_id: i64,
    pub decision: String,
    #[serde(default)]
    pub reviewer: String,
    #[serde(default)]
    pub note: String,
}

pub async fn review_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReviewRunBody>,
) -> (StatusCode, Json<Value>) {
    match executor::review_command_card_run(&state.pool, body.run_id, &body.decision, &body.reviewer, &body.note).await {
        Ok(run) => (StatusCode::OK, ok_json(json!({ "run": run }))),
        Err(e) => err_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRunBody {
    pub run_id: i64,
    #[serde(default)]
    pub actor: String,
    pub timeout_sec: Option<i64>,
}

pub async fn execute_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExecuteRunBody>,
) -> (StatusCode, Json<Value>) {
    match executor::execute_command_card_run(&state.pool, body.run_id, &body.actor, body.timeout_sec).await {
        Ok(outcome) => (
            StatusCode::OK,
            ok_json(json!({ "success": outcome.success, "run": outcome.run, "message": outcome.message })),
        ),
        Err(e) => err_response(e),
    }
}
