//! `approval` tool (spec §4.K): `request`, `respond`, `list`, `get`.
//! The in-tool human-in-the-loop approval, distinct from the topology
//! approval state machine (§4.G).

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;

use super::{err, i64_arg, ok, opt_str_arg, str_arg, str_vec_arg, unknown_action, Tool};
use crate::error::BusError;
use crate::state_files::{self, RequestApproval};

pub struct ApprovalTool;

#[async_trait]
impl Tool for ApprovalTool {
    fn name(&self) -> &'static str {
        "approval"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["request", "respond", "list", "get"]
    }

    async fn call(&self, pool: &PgPool, action: &str, args: Value) -> Value {
        match action {
            "request" => {
                let input = RequestApproval {
                    requester: str_arg(&args, "requester"),
                    target_agent: str_arg(&args, "target_agent"),
                    title: str_arg(&args, "title"),
                    description: str_arg(&args, "description"),
                    options: str_vec_arg(&args, "options"),
                };
                match state_files::request_approval(pool, input).await {
                    Ok(approval) => ok(json!({"approval": approval})),
                    Err(e) => err(e),
                }
            }
            "respond" => {
                let approval_id = str_arg(&args, "approval_id");
                let decision = str_arg(&args, "decision");
                let approver = str_arg(&args, "approver");
                let reason = str_arg(&args, "reason");
                match state_files::respond_approval(pool, &approval_id, &decision, &approver, &reason).await {
                    Ok(approval) => ok(json!({"approval": approval})),
                    Err(e) => err(e),
                }
            }
            "list" => {
                let status = opt_str_arg(&args, "status");
                match state_files::list_approvals_in_tool(status.as_deref(), i64_arg(&args, "limit")).await {
                    Ok(approvals) => ok(json!({"approvals": approvals})),
                    Err(e) => err(e),
                }
            }
            "get" => {
                let approval_id = str_arg(&args, "approval_id");
                match state_files::get_approval_in_tool(&approval_id).await {
                    Ok(Some(approval)) => ok(json!({"approval": approval})),
                    Ok(None) => err(BusError::NotFound(format!("approval not found: {approval_id}"))),
                    Err(e) => err(e),
                }
            }
            other => unknown_action("approval", other),
        }
    }
}
