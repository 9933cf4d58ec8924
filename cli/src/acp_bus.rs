//! `acp-bus` (spec §4.K): exposes the tool registry over stdin/stdout as
//! newline-delimited JSON-RPC-ish request/response, the way the teacher's
//! ACP/MCP-oriented `ToolSpec`/`ToolCallContent` types frame a call —
//! one request object per line in, one response object per line out.
//!
//! Request: `{"id": <any>, "tool": "task", "action": "create", "args": {...}}`.
//! Response: `{"id": <echoed>, "result": <tool envelope>}`, or, for requests
//! missing a known `tool`, `{"id": <echoed>, "error": "..."}`.
//!
//! A request with `"tool": "tools/list"` (no `action`/`args` required)
//! returns the catalog of every registered tool and its actions, for
//! client-side discovery.

use std::io::{BufRead, Write};
use std::sync::Arc;

use serde_json::{json, Value};
use sqlx::PgPool;

use orch_core::terminal_bridge::TerminalBridge;
use orch_core::tools::registry;

/// Runs the request/response loop until stdin is closed (EOF). Malformed
/// input lines are answered with an error response rather than aborting the
/// whole session, since one bad line from a client shouldn't kill the bus.
pub async fn serve_stdio(
    pool: &PgPool,
    bridge: Arc<dyn TerminalBridge>,
) -> std::io::Result<()> {
    let tools = registry(bridge);
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(pool, &tools, &line).await;
        writeln!(stdout, "{}", response)?;
        stdout.flush()?;
    }
    Ok(())
}

async fn handle_line(pool: &PgPool, tools: &[Box<dyn orch_core::Tool>], line: &str) -> String {
    let request: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return json!({"id": Value::Null, "error": format!("invalid json: {e}")}).to_string(),
    };
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let tool_name = request.get("tool").and_then(Value::as_str).unwrap_or_default();

    if tool_name == "tools/list" {
        let catalog: Vec<Value> = tools
            .iter()
            .map(|t| json!({ "tool": t.name(), "actions": t.actions() }))
            .collect();
        return json!({"id": id, "result": {"tools": catalog}}).to_string();
    }

    let action = request.get("action").and_then(Value::as_str).unwrap_or_default();
    let args = request.get("args").cloned().unwrap_or_else(|| json!({}));

    match tools.iter().find(|t| t.name() == tool_name) {
        Some(tool) => {
            let result = tool.call(pool, action, args).await;
            json!({"id": id, "result": result}).to_string()
        }
        None => json!({"id": id, "error": format!("unknown tool: {tool_name}")}).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `connect_lazy` builds a real `PgPool` handle without touching the
    // network, which is enough for the `tools/list` and unknown-tool paths
    // below since neither issues a query.
    fn lazy_pool() -> PgPool {
        sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/orchestrator_bus_test_unreachable")
            .expect("connect_lazy builds without connecting")
    }

    #[tokio::test]
    async fn tools_list_request_enumerates_registry() {
        let tools = registry(Arc::new(orch_core::NullBridge));
        let pool = lazy_pool();
        let line = json!({"id": 1, "tool": "tools/list"}).to_string();
        let response: Value = serde_json::from_str(&handle_line(&pool, &tools, &line).await).unwrap();
        assert_eq!(response["id"], json!(1));
        let listed = response["result"]["tools"].as_array().unwrap();
        assert_eq!(listed.len(), tools.len());
    }

    #[tokio::test]
    async fn unknown_tool_reports_error_without_panicking() {
        let tools = registry(Arc::new(orch_core::NullBridge));
        let pool = lazy_pool();
        let line = json!({"id": 7, "tool": "nonexistent", "action": "noop"}).to_string();
        let response: Value = serde_json::from_str(&handle_line(&pool, &tools, &line).await).unwrap();
        assert_eq!(response["id"], json!(7));
        assert!(response["error"].as_str().unwrap().contains("nonexistent"));
    }

    #[tokio::test]
    async fn invalid_json_line_reports_error() {
        let tools = registry(Arc::new(orch_core::NullBridge));
        let pool = lazy_pool();
        let response: Value = serde_json::from_str(&handle_line(&pool, &tools, "not json").await).unwrap();
        assert!(response["error"].as_str().unwrap().contains("invalid json"));
    }
}
