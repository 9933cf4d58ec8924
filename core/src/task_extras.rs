//! Read-only projections for task acknowledgements, DAGs, and trace spans
//! (spec §6: `GET /api/task-acks`, `/api/task-dags`, `/api/task-traces`,
//! `/api/task-traces/spans`).
//!
//! Grounded in `original_source/dashboard.py`'s `list_task_acks`/
//! `list_task_dags`/`get_task_dag_detail`/`list_task_trace_spans` read
//! paths. The write paths those functions have in the original (`save_*`,
//! `update_task_ack_status`, `delete_task_*`) have no HTTP surface in this
//! system — the task/approval/lock primitives in [`crate::state_files`]
//! already own mutation of in-flight work, so these three are exposed here
//! as read-only JSON-file projections rather than a second mutable store.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BusResult;

const XDG_APP_NAME: &str = "orchestrator-bus";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAck {
    pub task_id: String,
    pub agent_id: String,
    pub title: String,
    pub description: String,
    pub project_id: String,
    pub status: String,
    pub priority: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDag {
    pub dag_id: String,
    pub title: String,
    pub status: String,
    pub nodes: Value,
    pub edges: Value,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTraceSpan {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub name: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub status: String,
}

fn state_file_path(filename: &str) -> BusResult<PathBuf> {
    let dirs = cross_xdg::BaseDirs::new()
        .map_err(|e| crate::error::BusError::ExternalUnavailable(format!("xdg base dirs: {e}")))?;
    let dir = dirs.state_home().join(XDG_APP_NAME);
    Ok(dir.join(filename))
}

fn read_array<T: serde::de::DeserializeOwned>(filename: &str) -> BusResult<Vec<T>> {
    let path = state_file_path(filename)?;
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            let rows: Vec<Value> = serde_json::from_str(&text).unwrap_or_default();
            Ok(rows
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(crate::error::BusError::ExternalUnavailable(format!(
            "read {filename}: {e}"
        ))),
    }
}

pub fn list_task_acks(limit: Option<i64>) -> BusResult<Vec<TaskAck>> {
    let mut rows: Vec<TaskAck> = read_array("task_acks.json")?;
    rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    let limit = config::normalize_limit(limit, 100, 500) as usize;
    rows.truncate(limit);
    Ok(rows)
}

pub fn list_task_dags(limit: Option<i64>) -> BusResult<Vec<TaskDag>> {
    let mut rows: Vec<TaskDag> = read_array("task_dags.json")?;
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let limit = config::normalize_limit(limit, 50, 200) as usize;
    rows.truncate(limit);
    Ok(rows)
}

/// All spans across every trace; filter by `trace_id` when given (spec's
/// `/api/task-traces/spans?trace_id=...`).
pub fn list_task_trace_spans(trace_id: Option<&str>) -> BusResult<Vec<TaskTraceSpan>> {
    let rows: Vec<TaskTraceSpan> = read_array("task_traces.json")?;
    Ok(match trace_id {
        Some(id) if !id.is_empty() => rows.into_iter().filter(|s| s.trace_id == id).collect(),
        _ => rows,
    })
}

/// Distinct trace ids, most recently started first — backs the bare
/// `/api/task-traces` listing (one row per trace, not per span).
pub fn list_task_traces(limit: Option<i64>) -> BusResult<Vec<TaskTraceSpan>> {
    let mut rows: Vec<TaskTraceSpan> = read_array("task_traces.json")?;
    rows.retain(|s| s.parent_span_id.is_none());
    rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    let limit = config::normalize_limit(limit, 100, 500) as usize;
    rows.truncate(limit);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_yield_empty_lists() {
        std::env::set_var("XDG_STATE_HOME", "/nonexistent-task-extras-test-dir");
        assert!(list_task_acks(None).unwrap().is_empty());
        assert!(list_task_dags(None).unwrap().is_empty());
        assert!(list_task_trace_spans(None).unwrap().is_empty());
    }
}
