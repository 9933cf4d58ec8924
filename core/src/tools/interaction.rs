//! `interaction` tool (spec §4.K): `create`, `list`, `review`, `roster`,
//! `register`.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;

use super::{bool_arg, err, i64_arg, ok, str_arg, str_vec_arg, unknown_action, Tool};
use crate::error::BusError;
use crate::ops_store::{self, CreateInteraction, ListInteractions};
use crate::roster;

pub struct InteractionTool;

#[async_trait]
impl Tool for InteractionTool {
    fn name(&self) -> &'static str {
        "interaction"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["create", "list", "review", "roster", "register"]
    }

    async fn call(&self, pool: &PgPool, action: &str, args: Value) -> Value {
        match action {
            "create" => {
                let input = CreateInteraction {
                    sender: str_arg(&args, "sender"),
                    receiver: str_arg(&args, "receiver"),
                    msg_type: str_arg(&args, "msg_type"),
                    content: str_arg(&args, "content"),
                    thread_id: str_arg(&args, "thread_id"),
                    parent_id: i64_arg(&args, "parent_id"),
                    requires_review: bool_arg(&args, "requires_review", false),
                    metadata: args.get("metadata").cloned(),
                    status: str_arg(&args, "status"),
                };
                match ops_store::create_interaction(pool, input).await {
                    Ok(interaction) => ok(json!({"interaction": interaction})),
                    Err(e) => err(e),
                }
            }
            "list" => {
                let q = ListInteractions {
                    thread_id: str_arg(&args, "thread_id"),
                    sender: str_arg(&args, "sender"),
                    receiver: str_arg(&args, "receiver"),
                    msg_type: str_arg(&args, "msg_type"),
                    status: str_arg(&args, "status"),
                    requires_review: args.get("requires_review").and_then(Value::as_bool),
                    limit: i64_arg(&args, "limit"),
                };
                match ops_store::list_interactions(pool, q).await {
                    Ok(interactions) => ok(json!({"interactions": interactions})),
                    Err(e) => err(e),
                }
            }
            "review" => {
                let interaction_id = i64_arg(&args, "interaction_id").unwrap_or_default();
                let status = str_arg(&args, "status");
                let reviewer = str_arg(&args, "reviewer");
                let note = str_arg(&args, "note");
                match ops_store::review_interaction(pool, interaction_id, &status, &reviewer, &note).await {
                    Ok(interaction) => ok(json!({"interaction": interaction})),
                    Err(e) => err(e),
                }
            }
            "roster" => match roster::roster().await {
                Ok(entries) => ok(json!({"roster": entries})),
                Err(e) => err(e),
            },
            "register" => {
                let agent_id = str_arg(&args, "agent_id");
                if agent_id.is_empty() {
                    return err(BusError::Validation("agent_id is required".to_string()));
                }
                let agent_name = str_arg(&args, "agent_name");
                let skills = str_vec_arg(&args, "skills");
                match roster::register_agent(pool, &agent_id, &agent_name, skills).await {
                    Ok(entry) => ok(json!({"agent": entry})),
                    Err(e) => err(e),
                }
            }
            other => unknown_action("interaction", other),
        }
    }
}
