//! `command_card` tool (spec §4.K): `save`, `get`, `list`, `toggle`,
//! `prepare`, `review`, `exec_run`, `exec`, `get_run`, `list_runs`.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;

use super::{bool_arg, err, i64_arg, ok, str_arg, unknown_action, Tool};
use crate::error::BusError;
use crate::executor;
use crate::ops_store::{self, ListCommandCards, SaveCommandCard};

pub struct CommandCardTool;

#[async_trait]
impl Tool for CommandCardTool {
    fn name(&self) -> &'static str {
        "command_card"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["save", "get", "list", "toggle", "prepare", "review", "exec_run", "exec", "get_run", "list_runs"]
    }

    async fn call(&self, pool: &PgPool, action: &str, args: Value) -> Value {
        match action {
            "save" => {
                let input = SaveCommandCard {
                    card_key: str_arg(&args, "card_key"),
                    title: str_arg(&args, "title"),
                    command_template: str_arg(&args, "command_template"),
                    description: str_arg(&args, "description"),
                    args_schema: args.get("args_schema").cloned(),
                    risk_level: str_arg(&args, "risk_level"),
                    enabled: bool_arg(&args, "enabled", true),
                    updated_by: str_arg(&args, "updated_by"),
                };
                match ops_store::save_command_card(pool, input).await {
                    Ok(card) => ok(json!({"command_card": card})),
                    Err(e) => err(e),
                }
            }
            "get" => {
                let card_key = str_arg(&args, "card_key");
                match ops_store::get_command_card(pool, &card_key).await {
                    Ok(Some(card)) => ok(json!({"command_card": card})),
                    Ok(None) => err(BusError::NotFound(format!("command card not found: {card_key}"))),
                    Err(e) => err(e),
                }
            }
            "list" => {
                let q = ListCommandCards {
                    keyword: str_arg(&args, "keyword"),
                    risk_level: str_arg(&args, "risk_level"),
                    enabled_only: bool_arg(&args, "enabled_only", false),
                    limit: i64_arg(&args, "limit"),
                };
                match ops_store::list_command_cards(pool, q).await {
                    Ok(cards) => ok(json!({"command_cards": cards})),
                    Err(e) => err(e),
                }
            }
            "toggle" => {
                let card_key = str_arg(&args, "card_key");
                let enabled = bool_arg(&args, "enabled", true);
                let updated_by = str_arg(&args, "updated_by");
                match ops_store::set_command_card_enabled(pool, &card_key, enabled, &updated_by).await {
                    Ok(card) => ok(json!({"command_card": card})),
                    Err(e) => err(e),
                }
            }
            "prepare" => {
                let card_key = str_arg(&args, "card_key");
                let params = args.get("params").cloned().unwrap_or(Value::Null);
                let requested_by = str_arg(&args, "requested_by");
                let require_review = args.get("require_review").and_then(Value::as_bool);
                match executor::prepare_command_card_run(pool, &card_key, params, &requested_by, require_review).await {
                    Ok(outcome) => ok(json!({
                        "run": outcome.run,
                        "needs_review": outcome.needs_review,
                        "dangerous_command": outcome.dangerous_command,
                        "dangerous_pattern": outcome.dangerous_pattern,
                        "interaction": outcome.interaction,
                    })),
                    Err(e) => err(e),
                }
            }
            "review" => {
                let run_id = i64_arg(&args, "run_id").unwrap_or_default();
                let decision = str_arg(&args, "decision");
                let reviewer = str_arg(&args, "reviewer");
                let note = str_arg(&args, "note");
                match executor::review_command_card_run(pool, run_id, &decision, &reviewer, &note).await {
                    Ok(run) => ok(json!({"run": run})),
                    Err(e) => err(e),
                }
            }
            "exec_run" => {
                let run_id = i64_arg(&args, "run_id").unwrap_or_default();
                let actor = str_arg(&args, "actor");
                match executor::execute_command_card_run(pool, run_id, &actor, i64_arg(&args, "timeout_sec")).await {
                    Ok(outcome) => ok(json!({"success": outcome.success, "run": outcome.run, "message": outcome.message})),
                    Err(e) => err(e),
                }
            }
            "exec" => {
                let card_key = str_arg(&args, "card_key");
                let params = args.get("params").cloned().unwrap_or(Value::Null);
                let requested_by = str_arg(&args, "requested_by");
                let auto_approve = bool_arg(&args, "auto_approve", false);
                let reviewer = str_arg(&args, "reviewer");
                let review_note = str_arg(&args, "review_note");
                match executor::execute_command_card(
                    pool,
                    &card_key,
                    params,
                    &requested_by,
                    auto_approve,
                    &reviewer,
                    &review_note,
                    i64_arg(&args, "timeout_sec"),
                )
                .await
                {
                    Ok(outcome) => ok(json!({
                        "pending_review": outcome.pending_review,
                        "run": outcome.run,
                        "interaction": outcome.interaction,
                        "message": outcome.message,
                    })),
                    Err(e) => err(e),
                }
            }
            "get_run" => {
                let run_id = i64_arg(&args, "run_id").unwrap_or_default();
                match executor::get_command_card_run(pool, run_id).await {
                    Ok(Some(run)) => ok(json!({"run": run})),
                    Ok(None) => err(BusError::NotFound(format!("run not found: {run_id}"))),
                    Err(e) => err(e),
                }
            }
            "list_runs" => {
                let q = executor::ListCommandCardRuns {
                    card_key: str_arg(&args, "card_key"),
                    status: str_arg(&args, "status"),
                    requested_by: str_arg(&args, "requested_by"),
                    limit: i64_arg(&args, "limit"),
                };
                match executor::list_command_card_runs(pool, q).await {
                    Ok(runs) => ok(json!({"runs": runs})),
                    Err(e) => err(e),
                }
            }
            other => unknown_action("command_card", other),
        }
    }
}
