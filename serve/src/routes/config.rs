//! `GET /api/config` / `POST /api/config` (spec §6): read/write
//! configuration; POST body is a flat object, unknown keys rejected with
//! 400, numeric fields type-checked, select fields constrained to an
//! enumerated set.
//!
//! Grounded in the atomic-replace JSON-file idiom established in
//! `orch_core::topology` for the architecture config; the field table
//! below enumerates the configuration keys listed in spec §6.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Map, Value};

use crate::response::{ok_json, ApiError};
use crate::state::AppState;

enum Kind {
    Str,
    Int,
    Float,
    Bool,
    Enum(&'static [&'static str]),
}

const FIELDS: &[(&str, Kind)] = &[
    ("llm_api_key", Kind::Str),
    ("llm_base_url", Kind::Str),
    ("llm_model", Kind::Str),
    ("llm_temperature", Kind::Float),
    ("llm_timeout_sec", Kind::Int),
    ("llm_retries", Kind::Int),
    ("store_connection_string", Kind::Str),
    ("store_schema", Kind::Str),
    ("store_pool_min", Kind::Int),
    ("store_pool_max", Kind::Int),
    ("store_pool_timeout_sec", Kind::Int),
    ("monitor_interval_sec", Kind::Int),
    ("monitor_read_lines", Kind::Int),
    ("approval_ttl_sec", Kind::Int),
    ("approval_archive_days", Kind::Int),
    ("log_level", Kind::Enum(&["trace", "debug", "info", "warn", "error"])),
    ("log_rotation_bytes", Kind::Int),
    ("log_rotation_count", Kind::Int),
    ("command_card_execution_enabled", Kind::Bool),
    ("agent_db_execute_enabled", Kind::Bool),
    ("dashboard_sse_sync_sec", Kind::Int),
    ("telegram_bot_token", Kind::Str),
    ("telegram_chat_id", Kind::Str),
    ("telegram_watchdog_interval_sec", Kind::Int),
];

fn kind_of(key: &str) -> Option<&'static Kind> {
    FIELDS.iter().find(|(k, _)| *k == key).map(|(_, k)| k)
}

fn config_path() -> Result<PathBuf, ApiError> {
    let dirs = cross_xdg::BaseDirs::new()
        .map_err(|e| ApiError(orch_core::BusError::ExternalUnavailable(format!("xdg base dirs: {e}"))))?;
    let dir = dirs.config_home().join("orchestrator-bus");
    Ok(dir.join("config.json"))
}

fn read_config(path: &PathBuf) -> Value {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn validate(body: &Value) -> Result<(), (StatusCode, String)> {
    let obj = match body.as_object() {
        Some(m) => m,
        None => return Err((StatusCode::BAD_REQUEST, "config body must be a flat JSON object".to_string())),
    };
    for (key, value) in obj {
        let kind = match kind_of(key) {
            Some(k) => k,
            None => return Err((StatusCode::BAD_REQUEST, format!("unknown config key: {key}"))),
        };
        let ok = match kind {
            Kind::Str => value.is_string(),
            Kind::Int => value.is_i64() || value.is_u64(),
            Kind::Float => value.is_f64() || value.is_i64() || value.is_u64(),
            Kind::Bool => value.is_boolean(),
            Kind::Enum(options) => value.as_str().map(|s| options.contains(&s)).unwrap_or(false),
        };
        if !ok {
            return Err((StatusCode::BAD_REQUEST, format!("invalid value for config key: {key}")));
        }
    }
    Ok(())
}

pub async fn get_config(State(_state): State<Arc<AppState>>) -> Json<Value> {
    let path = match config_path() {
        Ok(p) => p,
        Err(_) => return ok_json(json!({ "config": {} })),
    };
    ok_json(json!({ "config": read_config(&path) }))
}

pub async fn post_config(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    validate(&body).map_err(|(status, msg)| (status, Json(json!({ "ok": false, "error": msg }))))?;

    let path = config_path().map_err(|e| (e.0.http_status(), Json(e.0.tool_envelope())))?;
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let mut current = read_config(&path);
    if let (Some(current_obj), Some(new_obj)) = (current.as_object_mut(), body.as_object()) {
        for (k, v) in new_obj {
            current_obj.insert(k.clone(), v.clone());
        }
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(&current).unwrap_or_default())
        .and_then(|_| std::fs::rename(&tmp, &path))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": e.to_string() })),
            )
        })?;

    let _ = orch_core::audit::append_event(
        &state.pool,
        orch_core::audit::AppendEvent {
            event_type: "config".to_string(),
            action: "config/update".to_string(),
            result: "ok".to_string(),
            actor: "dashboard".to_string(),
            target: "config".to_string(),
            detail: String::new(),
            level: "info".to_string(),
            extra: Some(body.clone()),
        },
    )
    .await;

    Ok(ok_json(json!({ "config": current })))
}
