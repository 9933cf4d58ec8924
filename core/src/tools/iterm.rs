//! `iterm` tool (spec §4.K): `list`, `send`, `read`, `clean`, `unregister`,
//! `clear_all` — unified session management over whatever [`TerminalBridge`]
//! backend is wired up (spec §4.J).
//!
//! `clean`/`unregister`/`clear_all` all reduce to stopping a session's
//! streamer: the trait has no separate "forget this session" verb, so
//! tearing down its streamer is the closest generalizable operation a
//! backend-agnostic bridge can expose.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;

use super::{bool_arg, err, ok, str_arg, unknown_action, Tool};
use crate::terminal_bridge::TerminalBridge;

pub struct ItermTool {
    bridge: Arc<dyn TerminalBridge>,
}

impl ItermTool {
    pub fn new(bridge: Arc<dyn TerminalBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl Tool for ItermTool {
    fn name(&self) -> &'static str {
        "iterm"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["list", "send", "read", "clean", "unregister", "clear_all"]
    }

    async fn call(&self, _pool: &PgPool, action: &str, args: Value) -> Value {
        match action {
            "list" => match self.bridge.list_sessions().await {
                Ok(sessions) => ok(json!({"sessions": sessions})),
                Err(e) => err(e),
            },
            "send" => {
                let agent_id = str_arg(&args, "agent_id");
                let input = str_arg(&args, "input");
                match self.bridge.send_input(&agent_id, &input).await {
                    Ok(()) => ok(json!({})),
                    Err(e) => err(e),
                }
            }
            "read" => {
                let agent_id = str_arg(&args, "agent_id");
                if bool_arg(&args, "screen", false) {
                    match self.bridge.read_screen(&agent_id).await {
                        Ok(screen) => ok(json!({"screen": screen})),
                        Err(e) => err(e),
                    }
                } else {
                    let all_agents = bool_arg(&args, "all_agents", agent_id.is_empty());
                    let read_lines = args.get("read_lines").and_then(Value::as_u64).unwrap_or(30) as usize;
                    let target = if agent_id.is_empty() { None } else { Some(agent_id.as_str()) };
                    match self.bridge.read_output(target, all_agents, read_lines).await {
                        Ok(rows) => ok(json!({"rows": rows})),
                        Err(e) => err(e),
                    }
                }
            }
            "clean" | "unregister" => {
                let agent_id = str_arg(&args, "agent_id");
                match self.bridge.stop_streamer(&agent_id).await {
                    Ok(()) => ok(json!({"agent_id": agent_id})),
                    Err(e) => err(e),
                }
            }
            "clear_all" => match self.bridge.list_sessions().await {
                Ok(sessions) => {
                    for session in &sessions {
                        let _ = self.bridge.stop_streamer(&session.agent_id).await;
                    }
                    ok(json!({"cleared": sessions.len()}))
                }
                Err(e) => err(e),
            },
            other => unknown_action("iterm", other),
        }
    }
}
