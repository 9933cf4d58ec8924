//! `prompt_template` tool (spec §4.K): `save`, `get`, `list`, `toggle`.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;

use super::{bool_arg, err, i64_arg, ok, str_arg, unknown_action, Tool};
use crate::error::BusError;
use crate::ops_store::{self, ListPromptTemplates, SavePromptTemplate};

pub struct PromptTemplateTool;

#[async_trait]
impl Tool for PromptTemplateTool {
    fn name(&self) -> &'static str {
        "prompt_template"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["save", "get", "list", "toggle"]
    }

    async fn call(&self, pool: &PgPool, action: &str, args: Value) -> Value {
        match action {
            "save" => {
                let input = SavePromptTemplate {
                    prompt_key: str_arg(&args, "prompt_key"),
                    title: str_arg(&args, "title"),
                    prompt_text: str_arg(&args, "prompt_text"),
                    agent_key: str_arg(&args, "agent_key"),
                    tool_name: str_arg(&args, "tool_name"),
                    variables: args.get("variables").cloned(),
                    tags: args.get("tags").cloned(),
                    enabled: bool_arg(&args, "enabled", true),
                    updated_by: str_arg(&args, "updated_by"),
                };
                match ops_store::save_prompt_template(pool, input).await {
                    Ok(template) => ok(json!({"prompt_template": template})),
                    Err(e) => err(e),
                }
            }
            "get" => {
                let prompt_key = str_arg(&args, "prompt_key");
                match ops_store::get_prompt_template(pool, &prompt_key).await {
                    Ok(Some(template)) => ok(json!({"prompt_template": template})),
                    Ok(None) => err(BusError::NotFound(format!("prompt not found: {prompt_key}"))),
                    Err(e) => err(e),
                }
            }
            "list" => {
                let q = ListPromptTemplates {
                    agent_key: str_arg(&args, "agent_key"),
                    tool_name: str_arg(&args, "tool_name"),
                    keyword: str_arg(&args, "keyword"),
                    enabled_only: bool_arg(&args, "enabled_only", false),
                    limit: i64_arg(&args, "limit"),
                };
                match ops_store::list_prompt_templates(pool, q).await {
                    Ok(templates) => ok(json!({"prompt_templates": templates})),
                    Err(e) => err(e),
                }
            }
            "toggle" => {
                let prompt_key = str_arg(&args, "prompt_key");
                let enabled = bool_arg(&args, "enabled", true);
                let updated_by = str_arg(&args, "updated_by");
                match ops_store::set_prompt_template_enabled(pool, &prompt_key, enabled, &updated_by).await {
                    Ok(template) => ok(json!({"prompt_template": template})),
                    Err(e) => err(e),
                }
            }
            other => unknown_action("prompt_template", other),
        }
    }
}
