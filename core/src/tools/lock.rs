//! `lock` tool (spec §4.K): `acquire`, `release`, `list`, `force_release`.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;

use super::{err, i64_arg, ok, str_arg, unknown_action, Tool};
use crate::state_files::{self, MIN_LOCK_TTL_SEC};

pub struct LockTool;

#[async_trait]
impl Tool for LockTool {
    fn name(&self) -> &'static str {
        "lock"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["acquire", "release", "list", "force_release"]
    }

    async fn call(&self, pool: &PgPool, action: &str, args: Value) -> Value {
        match action {
            "acquire" => {
                let resource = str_arg(&args, "resource");
                let owner = str_arg(&args, "owner");
                let ttl_sec = i64_arg(&args, "ttl_sec").unwrap_or(MIN_LOCK_TTL_SEC);
                match state_files::acquire_lock(pool, &resource, &owner, ttl_sec).await {
                    Ok(outcome) if outcome.ok => ok(json!({"lock": outcome.lock})),
                    Ok(outcome) => json!({"ok": false, "holder": outcome.holder}),
                    Err(e) => err(e),
                }
            }
            "release" => {
                let resource = str_arg(&args, "resource");
                let owner = str_arg(&args, "owner");
                match state_files::release_lock(pool, &resource, &owner).await {
                    Ok(released) => ok(json!({"released": released})),
                    Err(e) => err(e),
                }
            }
            "list" => match state_files::list_locks().await {
                Ok(locks) => ok(json!({"locks": locks})),
                Err(e) => err(e),
            },
            "force_release" => {
                let resource = str_arg(&args, "resource");
                let actor = str_arg(&args, "actor");
                match state_files::force_release_lock(pool, &resource, &actor).await {
                    Ok(released) => ok(json!({"released": released})),
                    Err(e) => err(e),
                }
            }
            other => unknown_action("lock", other),
        }
    }
}
