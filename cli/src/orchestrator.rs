//! `orchestrator run "<task>"` (spec §6 CLI modes): wraps the LLM graph —
//! a single-threaded think/act/observe loop over the same [`orch_core::tools`]
//! registry the dashboard and `acp-bus` expose, bounded by a max step count
//! so a misbehaving model can't loop forever.
//!
//! The full multi-strategy graph engine (ReAct/DUP/ToT/GoT) the teacher's
//! `loom` crate implements is out of scope here — the LLM HTTP API itself is
//! an external collaborator (spec §1) and this crate owns only the
//! orchestration-bus side of a run: rendering the tool catalog, dispatching
//! the model's tool calls, and feeding results back.

use std::sync::Arc;

use serde_json::{json, Value};
use sqlx::PgPool;

use orch_core::terminal_bridge::TerminalBridge;
use orch_core::tools::registry;

use crate::llm::{ChatMessage, LlmClient, LlmError};

const MAX_STEPS: usize = 12;

#[derive(thiserror::Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("model step limit ({0}) reached without a final answer")]
    StepLimitReached(usize),
}

fn system_prompt(tools: &[Box<dyn orch_core::Tool>]) -> String {
    let catalog: Vec<Value> = tools
        .iter()
        .map(|t| json!({ "tool": t.name(), "actions": t.actions() }))
        .collect();
    format!(
        "You are the master agent of a multi-agent orchestration bus. \
         You have access to these tools (tool name, allowed actions):\n{}\n\n\
         To call a tool, reply with exactly one JSON object: \
         {{\"tool\": \"<name>\", \"action\": \"<action>\", \"args\": {{...}}}}. \
         When you have the final answer for the operator, reply with exactly one JSON object: \
         {{\"final\": \"<answer text>\"}}. Reply with nothing else.",
        serde_json::to_string(&catalog).unwrap_or_default()
    )
}

/// Runs one task to completion (or to the step limit) and returns the
/// model's final answer text.
pub async fn run_task(
    pool: &PgPool,
    llm: Arc<dyn LlmClient>,
    bridge: Arc<dyn TerminalBridge>,
    task: &str,
) -> Result<String, OrchestratorError> {
    let tools = registry(bridge);
    let mut messages = vec![ChatMessage::system(system_prompt(&tools)), ChatMessage::user(task)];

    for _ in 0..MAX_STEPS {
        let reply = llm.complete(&messages).await?;
        let parsed: Option<Value> = serde_json::from_str(reply.trim()).ok();

        if let Some(answer) = parsed.as_ref().and_then(|v| v.get("final")).and_then(Value::as_str) {
            return Ok(answer.to_string());
        }

        let Some(call) = parsed else {
            // Model replied with plain text instead of the tool-call protocol;
            // treat it as the final answer rather than looping forever.
            return Ok(reply);
        };

        let tool_name = call.get("tool").and_then(Value::as_str).unwrap_or_default();
        let action = call.get("action").and_then(Value::as_str).unwrap_or_default();
        let args = call.get("args").cloned().unwrap_or_else(|| json!({}));

        let result = match tools.iter().find(|t| t.name() == tool_name) {
            Some(tool) => tool.call(pool, action, args).await,
            None => json!({"ok": false, "error": format!("unknown tool: {tool_name}")}),
        };

        messages.push(ChatMessage::assistant(reply));
        messages.push(ChatMessage::user(
            serde_json::to_string(&json!({ "tool_result": result })).unwrap_or_default(),
        ));
    }

    Err(OrchestratorError::StepLimitReached(MAX_STEPS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoFinal;

    #[async_trait]
    impl LlmClient for EchoFinal {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
            Ok(json!({"final": "done"}).to_string())
        }
    }

    #[test]
    fn system_prompt_lists_every_registered_tool() {
        let tools = registry(Arc::new(orch_core::NullBridge));
        let prompt = system_prompt(&tools);
        for tool in &tools {
            assert!(prompt.contains(tool.name()), "missing {} in prompt", tool.name());
        }
    }
}
