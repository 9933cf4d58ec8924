//! `task` tool (spec §4.K): `create`, `list`, `get`, `update`, `assign`,
//! `ready`, `progress`, `cancel`.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;

use super::{bool_arg, err, i64_arg, ok, opt_str_arg, str_arg, str_vec_arg, unknown_action, Tool};
use crate::error::BusError;
use crate::state_files::{self, CreateTask, ListTasks, UpdateTask};

pub struct TaskTool;

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &'static str {
        "task"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["create", "list", "get", "update", "assign", "ready", "progress", "cancel"]
    }

    async fn call(&self, pool: &PgPool, action: &str, args: Value) -> Value {
        match action {
            "create" => {
                let input = CreateTask {
                    title: str_arg(&args, "title"),
                    description: str_arg(&args, "description"),
                    creator: str_arg(&args, "creator"),
                    assignee: str_arg(&args, "assignee"),
                    priority: str_arg(&args, "priority"),
                    project_id: str_arg(&args, "project_id"),
                    depends_on: str_vec_arg(&args, "depends_on"),
                    timeout_sec: i64_arg(&args, "timeout_sec"),
                    max_retries: i64_arg(&args, "max_retries"),
                    idempotency_key: str_arg(&args, "idempotency_key"),
                };
                match state_files::create_task(pool, input).await {
                    Ok(task) => ok(json!({"task": task})),
                    Err(e) => err(e),
                }
            }
            "list" => {
                let filter = ListTasks {
                    status: opt_str_arg(&args, "status"),
                    assignee: opt_str_arg(&args, "assignee"),
                    project_id: opt_str_arg(&args, "project_id"),
                    limit: i64_arg(&args, "limit"),
                };
                match state_files::list_tasks(filter).await {
                    Ok(tasks) => ok(json!({"tasks": tasks})),
                    Err(e) => err(e),
                }
            }
            "get" => {
                let task_id = str_arg(&args, "task_id");
                match state_files::get_task(&task_id).await {
                    Ok(Some(task)) => ok(json!({"task": task})),
                    Ok(None) => err(BusError::NotFound(format!("task not found: {task_id}"))),
                    Err(e) => err(e),
                }
            }
            "update" => {
                let task_id = str_arg(&args, "task_id");
                let actor = str_arg(&args, "actor");
                let input = UpdateTask {
                    title: opt_str_arg(&args, "title"),
                    description: opt_str_arg(&args, "description"),
                    priority: opt_str_arg(&args, "priority"),
                    status: opt_str_arg(&args, "status"),
                    result: opt_str_arg(&args, "result"),
                };
                match state_files::update_task(pool, &task_id, &actor, input).await {
                    Ok(outcome) => ok(json!({"task": outcome.task, "auto_retried": outcome.auto_retried})),
                    Err(e) => err(e),
                }
            }
            "assign" => {
                let task_id = str_arg(&args, "task_id");
                let assignee = str_arg(&args, "assignee");
                let actor = str_arg(&args, "actor");
                match state_files::assign_task(pool, &task_id, &assignee, &actor).await {
                    Ok(task) => ok(json!({"task": task})),
                    Err(e) => err(e),
                }
            }
            "ready" => match state_files::ready_tasks().await {
                Ok(tasks) => ok(json!({"tasks": tasks})),
                Err(e) => err(e),
            },
            "progress" => {
                let task_id = str_arg(&args, "task_id");
                let note = str_arg(&args, "note");
                let actor = str_arg(&args, "actor");
                match state_files::progress_task(pool, &task_id, &note, &actor).await {
                    Ok(task) => ok(json!({"task": task})),
                    Err(e) => err(e),
                }
            }
            "cancel" => {
                let task_id = str_arg(&args, "task_id");
                let reason = str_arg(&args, "reason");
                let actor = str_arg(&args, "actor");
                let _ = bool_arg(&args, "force", false);
                match state_files::cancel_task(pool, &task_id, &reason, &actor).await {
                    Ok(task) => ok(json!({"task": task})),
                    Err(e) => err(e),
                }
            }
            other => unknown_action("task", other),
        }
    }
}
