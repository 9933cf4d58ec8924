//! Guarded raw-SQL access for the `db` tool (spec §4.K).
//!
//! Grounded in `original_source/agent_ops_store.py`'s `db_query`/`db_execute`
//! pair: `db_query` wraps any single read-only statement in an outer
//! `SELECT * FROM (...) LIMIT` and runs it inside a `SET LOCAL
//! transaction_read_only = on` transaction; `db_execute` accepts only a
//! single INSERT/UPDATE/DELETE/MERGE (or a `WITH` containing one) against a
//! table allowlist, rejects DDL/admin keywords outright, and stays disabled
//! unless `AGENT_DB_EXECUTE_ENABLED` is truthy.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use sqlx::{Column, PgPool, Row};

use crate::audit::{append_event, AppendEvent};
use crate::error::{BusError, BusResult};

const MAX_SQL_LENGTH: usize = 4096;

static SQL_WRITE_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(insert|update|delete|merge|create|alter|drop|truncate|grant|revoke|comment|copy|vacuum|analyze|refresh|reindex|cluster|call|do)\b").unwrap()
});
static SQL_DANGEROUS_EXEC_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(create|alter|drop|truncate|grant|revoke|comment|copy|vacuum|analyze|refresh|reindex|cluster|call|do)\b").unwrap()
});
static SQL_DML_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(insert|update|delete|merge)\b").unwrap());
static SQL_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)('(?:''|[^'])*')|(\x22(?:\x22\x22|[^\x22])*\x22)|(--[^\n]*$)|(/\*.*?\*/)").unwrap());
static DML_TARGET_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:insert\s+into|update|delete\s+from|merge\s+into)\s+([A-Za-z_][A-Za-z0-9_$]*(?:\.[A-Za-z_][A-Za-z0-9_$]*)?)\b").unwrap()
});

const ALLOWED_EXEC_KEYWORDS: &[&str] = &["insert", "update", "delete", "merge", "with"];
const DB_EXECUTE_ALLOWED_TABLES: &[&str] =
    &["agent_interactions", "prompt_templates", "command_cards", "command_card_runs"];

fn strip_sql_literals(query: &str) -> String {
    SQL_TOKEN_RE.replace_all(query, " ").into_owned()
}

fn validate_single_statement(sql: &str) -> BusResult<String> {
    let text = sql.trim();
    if text.is_empty() {
        return Err(BusError::Validation("sql must not be empty".to_string()));
    }
    if text.len() > MAX_SQL_LENGTH {
        return Err(BusError::Validation(format!("sql exceeds max length ({MAX_SQL_LENGTH} chars)")));
    }
    let body = text.trim_end_matches(';').trim();
    if body.is_empty() {
        return Err(BusError::Validation("sql must not be empty".to_string()));
    }
    if strip_sql_literals(body).contains(';') {
        return Err(BusError::Validation("only a single SQL statement is allowed".to_string()));
    }
    Ok(body.to_string())
}

fn first_sql_keyword(query: &str) -> String {
    query
        .trim_start()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or("")
        .to_lowercase()
}

fn validate_read_only_query(sql: &str) -> BusResult<String> {
    let body = validate_single_statement(sql)?;
    let sanitized = strip_sql_literals(&body);
    let first = first_sql_keyword(&sanitized);
    if first != "select" && first != "with" {
        return Err(BusError::Validation("db_query only allows SELECT/CTE queries".to_string()));
    }
    if SQL_WRITE_KEYWORD_RE.is_match(&sanitized) {
        return Err(BusError::Validation("db_query detected a write keyword, refused".to_string()));
    }
    Ok(body)
}

fn validate_execute_query(sql: &str) -> BusResult<String> {
    let body = validate_single_statement(sql)?;
    let sanitized = strip_sql_literals(&body);
    let first = first_sql_keyword(&sanitized);
    if first.is_empty() {
        return Err(BusError::Validation("invalid sql syntax".to_string()));
    }
    if first == "select" || first == "show" || first == "explain" {
        return Err(BusError::Validation("db_execute does not allow read-only SQL, use db_query instead".to_string()));
    }
    if !ALLOWED_EXEC_KEYWORDS.contains(&first.as_str()) {
        return Err(BusError::Validation(format!("db_execute does not support this SQL type: {first}")));
    }
    if SQL_DANGEROUS_EXEC_KEYWORD_RE.is_match(&sanitized) {
        return Err(BusError::Validation("db_execute forbids DDL/admin statements".to_string()));
    }
    if first == "with" && !SQL_DML_KEYWORD_RE.is_match(&sanitized) {
        return Err(BusError::Validation("db_execute's WITH statement must contain INSERT/UPDATE/DELETE/MERGE".to_string()));
    }

    let mut dml_tables: Vec<String> = DML_TARGET_TABLE_RE
        .captures_iter(&sanitized)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase().rsplit('.').next().unwrap().to_string())
        .collect();
    dml_tables.sort();
    dml_tables.dedup();
    if dml_tables.is_empty() {
        return Err(BusError::Validation("db_execute did not detect a DML target table".to_string()));
    }

    let blocked: Vec<&String> = dml_tables.iter().filter(|t| !DB_EXECUTE_ALLOWED_TABLES.contains(&t.as_str())).collect();
    if !blocked.is_empty() {
        let names: Vec<&str> = blocked.iter().map(|s| s.as_str()).collect();
        return Err(BusError::Validation(format!("db_execute forbids non-allowlisted tables: {}", names.join(", "))));
    }

    Ok(body)
}

fn is_db_execute_enabled() -> bool {
    config::as_bool_env("AGENT_DB_EXECUTE_ENABLED", false)
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> BusResult<Value> {
    let mut obj = serde_json::Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value: Value = row
            .try_get::<Option<Value>, _>(i)
            .or_else(|_| row.try_get::<Option<String>, _>(i).map(|v| v.map(Value::String)))
            .or_else(|_| row.try_get::<Option<i64>, _>(i).map(|v| v.map(|n| Value::from(n))))
            .or_else(|_| row.try_get::<Option<f64>, _>(i).map(|v| v.map(|n| Value::from(n))))
            .or_else(|_| row.try_get::<Option<bool>, _>(i).map(|v| v.map(Value::Bool)))
            .map_err(|e| BusError::InternalInvariant(format!("unsupported column type: {e}")))?
            .unwrap_or(Value::Null);
        obj.insert(column.name().to_string(), value);
    }
    Ok(Value::Object(obj))
}

/// Runs a read-only query, outer-wrapped and row-capped (spec §4.K `db.query`).
pub async fn db_query(pool: &PgPool, sql_text: &str, limit: Option<i64>) -> BusResult<Vec<Value>> {
    let query = validate_read_only_query(sql_text)?;
    let max_items = config::normalize_limit(limit, 200, 1000);
    let wrapped = format!("SELECT * FROM ({query}) AS t LIMIT $1");

    let mut tx = pool.begin().await?;
    sqlx::query("SET LOCAL transaction_read_only = on").execute(&mut *tx).await?;
    let rows = sqlx::query(&wrapped).bind(max_items).fetch_all(&mut *tx).await?;
    tx.rollback().await?;

    rows.iter().map(row_to_json).collect()
}

#[derive(Debug, Serialize)]
pub struct ExecuteOutcome {
    pub rowcount: u64,
}

/// Runs a single guarded DML statement (spec §4.K `db.execute`). Disabled by
/// default; set `AGENT_DB_EXECUTE_ENABLED=1` to allow it.
pub async fn db_execute(pool: &PgPool, sql_text: &str, actor: &str) -> BusResult<ExecuteOutcome> {
    if !is_db_execute_enabled() {
        return Err(BusError::GuardedDenied(
            "db_execute is disabled: set AGENT_DB_EXECUTE_ENABLED=1 and retry".to_string(),
        ));
    }

    let query = validate_execute_query(sql_text)?;
    let result = sqlx::query(&query).execute(pool).await?;
    let rowcount = result.rows_affected();

    append_event(
        pool,
        AppendEvent {
            event_type: "db".to_string(),
            action: "execute".to_string(),
            result: "ok".to_string(),
            actor: actor.to_string(),
            target: "postgres".to_string(),
            detail: query.chars().take(180).collect(),
            level: "WARN".to_string(),
            extra: Some(serde_json::json!({"rowcount": rowcount})),
        },
    )
    .await?;

    Ok(ExecuteOutcome { rowcount })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_query_rejects_write_keyword() {
        assert!(validate_read_only_query("update foo set x=1").is_err());
        assert!(validate_read_only_query("select * from foo").is_ok());
    }

    #[test]
    fn execute_query_rejects_non_allowlisted_table() {
        assert!(validate_execute_query("insert into other_table (a) values (1)").is_err());
        assert!(validate_execute_query("insert into agent_interactions (a) values (1)").is_ok());
    }

    #[test]
    fn execute_query_rejects_ddl() {
        assert!(validate_execute_query("drop table command_cards").is_err());
    }

    #[test]
    fn single_statement_guard_rejects_multiple_statements() {
        assert!(validate_single_statement("select 1; select 2").is_err());
        assert!(validate_single_statement("select ';' from foo").is_ok());
    }
}
