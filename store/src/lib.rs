//! Postgres connection pool, migration runner, and agent-facing SQL guards.
//!
//! This crate has no equivalent in the teacher repo (which persists to
//! SQLite via `rusqlite`) — it is grounded instead in `other_examples`'
//! sqlx/`PgPool` idiom and in `original_source/db/{postgres.py,migrator.py}`
//! and `original_source/agent_ops_store.py` for exact runtime semantics.

mod error;
mod guards;
mod migrate;
mod pool;

pub use error::StoreError;
pub use guards::{
    is_db_execute_enabled, validate_execute_query, validate_read_only_query,
    DB_EXECUTE_ALLOWED_TABLES, MAX_SQL_LENGTH,
};
pub use migrate::{default_migrations_dir, discover_migrations, migrate_down, migrate_up, Migration};
pub use pool::{
    close_pool, connect_cursor, ensure_schema, ensure_schema_at, get_connection_string,
    get_pool, get_schema_name, Cursor, DEFAULT_SCHEMA, ENV_DATABASE_URL, ENV_SCHEMA_NAME,
};

use serde_json::Value;
use sqlx::PgPool;

/// Runs a guard-validated read-only query and returns up to `limit` rows as
/// JSON objects. Wraps the validated body as a subquery so arbitrary
/// `SELECT`/`WITH` statements compose with the row-limit clause regardless
/// of whether the caller's query already has its own `LIMIT`.
pub async fn db_query(pool: &PgPool, sql: &str, limit: i64) -> Result<Vec<Value>, StoreError> {
    let body = validate_read_only_query(sql)?;
    let bounded_limit = limit.clamp(1, 1000);

    let mut cursor = connect_cursor(pool, false, true).await?;
    let tx = cursor
        .tx
        .as_mut()
        .expect("connect_cursor(autocommit=false) always returns a transaction");

    let wrapped = format!("SELECT to_jsonb(t) AS row FROM ({body}) AS t LIMIT $1");
    let rows: Vec<(Value,)> = sqlx::query_as(&wrapped)
        .bind(bounded_limit)
        .fetch_all(&mut **tx)
        .await?;

    Ok(rows.into_iter().map(|(row,)| row).collect())
}

/// Runs a guard-validated DML statement, gated behind `AGENT_DB_EXECUTE_ENABLED`.
/// Returns the number of affected rows, or an error if the flag is off —
/// in which case the statement is never sent to the database.
pub async fn db_execute(pool: &PgPool, sql: &str) -> Result<u64, StoreError> {
    if !is_db_execute_enabled() {
        return Err(StoreError::GuardedDenied(
            "db_execute is disabled (AGENT_DB_EXECUTE_ENABLED is not set)".to_string(),
        ));
    }
    let body = validate_execute_query(sql)?;

    let mut cursor = connect_cursor(pool, false, false).await?;
    let tx = cursor
        .tx
        .as_mut()
        .expect("connect_cursor(autocommit=false) always returns a transaction");

    let result = sqlx::query(&body).execute(&mut **tx).await?;
    let affected = result.rows_affected();

    cursor.tx.take().unwrap().commit().await?;
    Ok(affected)
}

/// Maps a missing row after an expected upsert/select to
/// [`StoreError::InternalInvariant`], matching `_require_row` in
/// `original_source/agent_ops_store.py`.
pub fn require_row<T>(row: Option<T>, action: &str) -> Result<T, StoreError> {
    row.ok_or_else(|| {
        StoreError::InternalInvariant(format!("{action} failed: the store returned no row"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_row_maps_none_to_internal_invariant() {
        let err = require_row::<i32>(None, "save_command_card").unwrap_err();
        assert!(matches!(err, StoreError::InternalInvariant(_)));
    }

    #[test]
    fn require_row_passes_through_some() {
        assert_eq!(require_row(Some(7), "save_command_card").unwrap(), 7);
    }
}
