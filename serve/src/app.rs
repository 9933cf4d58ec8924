//! Axum router assembly.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::routes;
use crate::sse::stream_handler;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::health::index_page))
        .route("/health", get(routes::health::health))
        .route("/ready", get(routes::health::ready))
        .route("/api/config", get(routes::config::get_config).post(routes::config::post_config))
        .route("/api/agent-status", get(routes::agent_status::get_agent_status))
        .route("/api/events/stream", get(stream_handler))
        .route("/api/audit", get(routes::audit::get_audit))
        .route("/api/system-log", get(routes::audit::get_system_log))
        .route("/api/ai-log", get(routes::audit::get_ai_log))
        .route("/api/system-log/export", get(routes::audit::export_system_log))
        .route("/api/ai-log/export", get(routes::audit::export_ai_log))
        .route(
            "/api/command-cards",
            get(routes::command_cards::list_cards).post(routes::command_cards::save_card),
        )
        .route("/api/command-cards/toggle", post(routes::command_cards::toggle_card))
        .route("/api/command-cards/delete", post(routes::command_cards::delete_card))
        .route("/api/command-cards/rollback", post(routes::command_cards::rollback_card))
        .route("/api/command-cards/execute", post(routes::command_cards::execute_card))
        .route("/api/command-card-runs", get(routes::command_cards::list_runs))
        .route(
            "/api/command-card-runs/review",
            post(routes::command_cards::review_run),
        )
        .route(
            "/api/command-card-runs/execute",
            post(routes::command_cards::execute_run),
        )
        .route("/api/topology/approvals", get(routes::topology::list_approvals))
        .route(
            "/api/topology/approvals/:approval_id/approve",
            post(routes::topology::approve),
        )
        .route(
            "/api/topology/approvals/:approval_id/reject",
            post(routes::topology::reject),
        )
        .route("/api/task-acks", get(routes::tasks::task_acks))
        .route("/api/task-dags", get(routes::tasks::task_dags))
        .route("/api/task-traces", get(routes::tasks::task_traces))
        .route("/api/task-traces/spans", get(routes::tasks::task_trace_spans))
        .route("/api/tools/:tool/:action", post(routes::tools::call_tool))
        .with_state(state)
}
