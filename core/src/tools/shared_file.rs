//! `shared_file` tool (spec §4.K): `write`, `read`, `list`, `delete`.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;

use super::{err, i64_arg, ok, str_arg, unknown_action, Tool};
use crate::error::BusError;
use crate::shared_file;

pub struct SharedFileTool;

#[async_trait]
impl Tool for SharedFileTool {
    fn name(&self) -> &'static str {
        "shared_file"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["write", "read", "list", "delete"]
    }

    async fn call(&self, pool: &PgPool, action: &str, args: Value) -> Value {
        match action {
            "write" => {
                let path = str_arg(&args, "path");
                let content = str_arg(&args, "content");
                let actor = str_arg(&args, "actor");
                match shared_file::write_file(pool, &path, &content, &actor).await {
                    Ok(file) => ok(json!({"file": file})),
                    Err(e) => err(e),
                }
            }
            "read" => {
                let path = str_arg(&args, "path");
                match shared_file::read_file(pool, &path).await {
                    Ok(Some(file)) => ok(json!({"file": file})),
                    Ok(None) => err(BusError::NotFound(format!("file not found: {path}"))),
                    Err(e) => err(e),
                }
            }
            "list" => {
                let prefix = str_arg(&args, "prefix");
                match shared_file::list_files(pool, &prefix, i64_arg(&args, "limit")).await {
                    Ok(files) => ok(json!({"files": files})),
                    Err(e) => err(e),
                }
            }
            "delete" => {
                let path = str_arg(&args, "path");
                let actor = str_arg(&args, "actor");
                match shared_file::delete_file(pool, &path, &actor).await {
                    Ok(deleted) => ok(json!({"deleted": deleted})),
                    Err(e) => err(e),
                }
            }
            other => unknown_action("shared_file", other),
        }
    }
}
