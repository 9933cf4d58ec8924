//! Tool Registry (spec component K): the typed action-dispatch surface
//! exposed to agents, an MCP/ACP-style wrapper around every store and
//! engine this crate builds.
//!
//! Shaped after the teacher's own `Tool` trait: a name, a spec for
//! discovery, and a single call entry point. Generalized
//! for action-dispatch tools — `call` takes an `action` on top of `args`
//! and returns a JSON `{ok, ...}` envelope directly (spec §7: "exceptions
//! → result envelopes") instead of propagating a `ToolSourceError`.

pub mod approval;
pub mod command_card;
pub mod db;
pub mod interaction;
pub mod iterm;
pub mod lock;
pub mod prompt_template;
pub mod shared_file;
pub mod task;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::error::BusError;
use crate::terminal_bridge::TerminalBridge;

#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name, e.g. `"task"` or `"command_card"`.
    fn name(&self) -> &'static str;

    /// The actions this tool accepts, for discovery/spec listings.
    fn actions(&self) -> &'static [&'static str];

    /// Dispatches one action. Never returns `Err` — failures are reported
    /// as `{ok:false, ...}` envelopes so agent-facing callers never see a
    /// raw exception.
    async fn call(&self, pool: &PgPool, action: &str, args: Value) -> Value;
}

pub fn ok(mut fields: Value) -> Value {
    if let Value::Object(ref mut map) = fields {
        map.insert("ok".to_string(), Value::Bool(true));
        return fields;
    }
    json!({"ok": true, "value": fields})
}

pub fn err(e: BusError) -> Value {
    e.tool_envelope()
}

pub fn unknown_action(tool: &str, action: &str) -> Value {
    err(BusError::Validation(format!("unknown {tool} action: {action}")))
}

pub fn str_arg(args: &Value, key: &str) -> String {
    args.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

pub fn opt_str_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string)
}

pub fn i64_arg(args: &Value, key: &str) -> Option<i64> {
    args.get(key).and_then(Value::as_i64)
}

pub fn bool_arg(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub fn str_vec_arg(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Builds the full registry. `bridge` backs the `iterm` tool's session
/// operations — pass [`crate::terminal_bridge::NullBridge`] when no real
/// backend is wired up.
pub fn registry(bridge: Arc<dyn TerminalBridge>) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(db::DbTool),
        Box::new(task::TaskTool),
        Box::new(approval::ApprovalTool),
        Box::new(lock::LockTool),
        Box::new(iterm::ItermTool::new(bridge)),
        Box::new(shared_file::SharedFileTool),
        Box::new(interaction::InteractionTool),
        Box::new(prompt_template::PromptTemplateTool),
        Box::new(command_card::CommandCardTool),
    ]
}
