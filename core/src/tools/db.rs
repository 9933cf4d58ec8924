//! `db` tool (spec §4.K): `query`, `execute`.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;

use super::{err, i64_arg, ok, str_arg, unknown_action, Tool};
use crate::sql_gate;

pub struct DbTool;

#[async_trait]
impl Tool for DbTool {
    fn name(&self) -> &'static str {
        "db"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["query", "execute"]
    }

    async fn call(&self, pool: &PgPool, action: &str, args: Value) -> Value {
        match action {
            "query" => {
                let sql = str_arg(&args, "sql");
                match sql_gate::db_query(pool, &sql, i64_arg(&args, "limit")).await {
                    Ok(rows) => ok(json!({"rows": rows})),
                    Err(e) => err(e),
                }
            }
            "execute" => {
                let sql = str_arg(&args, "sql");
                let actor = str_arg(&args, "actor");
                match sql_gate::db_execute(pool, &sql, &actor).await {
                    Ok(outcome) => ok(json!({"rowcount": outcome.rowcount})),
                    Err(e) => err(e),
                }
            }
            other => unknown_action("db", other),
        }
    }
}
