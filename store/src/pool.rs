//! Connection pool, schema validation, and scoped cursor acquisition.
//!
//! Grounded in `original_source/db/postgres.py`: a process-wide pool
//! singleton and a "schema ready" cache keyed by `(conn_string, schema)`,
//! both behind double-checked locking, so repeated `ensure_schema()` calls
//! from independent call sites are cheap after the first.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgPool, Postgres, Transaction};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::StoreError;
use crate::migrate;

pub const ENV_DATABASE_URL: &str = "ORCH_DATABASE_URL";
pub const ENV_SCHEMA_NAME: &str = "ORCH_DB_SCHEMA";
pub const DEFAULT_SCHEMA: &str = "public";

static SCHEMA_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

static POOL: OnceCell<AsyncMutex<Option<PgPool>>> = OnceCell::new();
static SCHEMA_READY: OnceCell<AsyncMutex<HashSet<(String, String)>>> = OnceCell::new();

/// Reads `ORCH_DATABASE_URL` from the environment.
pub fn get_connection_string() -> Result<String, StoreError> {
    std::env::var(ENV_DATABASE_URL)
        .map_err(|_| StoreError::Validation(format!("{ENV_DATABASE_URL} is not set")))
}

/// Reads `ORCH_DB_SCHEMA` (default `public`), rejecting names that are not
/// valid unquoted Postgres identifiers.
pub fn get_schema_name() -> Result<String, StoreError> {
    let schema = std::env::var(ENV_SCHEMA_NAME).unwrap_or_else(|_| DEFAULT_SCHEMA.to_string());
    if !SCHEMA_NAME_RE.is_match(&schema) {
        return Err(StoreError::Validation(format!(
            "invalid schema name: {schema}"
        )));
    }
    Ok(schema)
}

fn pool_cell() -> &'static AsyncMutex<Option<PgPool>> {
    POOL.get_or_init(|| AsyncMutex::new(None))
}

fn schema_ready_cell() -> &'static AsyncMutex<HashSet<(String, String)>> {
    SCHEMA_READY.get_or_init(|| AsyncMutex::new(HashSet::new()))
}

/// Returns the process-wide pool, creating it on first call (double-checked
/// locking: fast path reads under the lock, slow path connects once).
pub async fn get_pool() -> Result<PgPool, StoreError> {
    let mut guard = pool_cell().lock().await;
    if let Some(pool) = guard.as_ref() {
        return Ok(pool.clone());
    }
    let conn_string = get_connection_string()?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&conn_string)
        .await
        .map_err(|e| StoreError::ExternalUnavailable(e.to_string()))?;
    *guard = Some(pool.clone());
    Ok(pool)
}

/// Idempotent: runs any pending migrations and caches "ready" per
/// `(conn_string, schema)` so repeat calls are a no-op.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    let conn_string = get_connection_string()?;
    let schema = get_schema_name()?;
    let key = (conn_string, schema.clone());

    {
        let ready = schema_ready_cell().lock().await;
        if ready.contains(&key) {
            return Ok(());
        }
    }

    let mut ready = schema_ready_cell().lock().await;
    if ready.contains(&key) {
        return Ok(());
    }

    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\""))
        .execute(pool)
        .await?;
    migrate::migrate_up(pool, &migrate::default_migrations_dir()).await?;
    ready.insert(key);
    Ok(())
}

/// Scoped cursor acquisition: checks out a connection, sets `search_path`,
/// and optionally opens a read-only transaction.
///
/// `read_only=true` requires `autocommit=false`; combining read-only with
/// autocommit is a configuration error, matching `original_source/db/postgres.py`.
pub struct Cursor<'a> {
    /// `Some` when acquired with `autocommit=false`; callers execute
    /// queries against `tx` and must call `.commit()`/`.rollback()`.
    pub tx: Option<Transaction<'a, Postgres>>,
    /// `Some` when acquired with `autocommit=true`; callers execute queries
    /// directly against the connection.
    pub conn: Option<sqlx::pool::PoolConnection<Postgres>>,
}

pub async fn connect_cursor(
    pool: &PgPool,
    autocommit: bool,
    read_only: bool,
) -> Result<Cursor<'static>, StoreError> {
    if read_only && autocommit {
        return Err(StoreError::Validation(
            "read_only requires autocommit=false".to_string(),
        ));
    }
    let schema = get_schema_name()?;
    let mut conn = pool.acquire().await?;
    sqlx::query(&format!("SET search_path TO \"{schema}\""))
        .execute(&mut *conn)
        .await?;

    if autocommit {
        Ok(Cursor {
            tx: None,
            conn: Some(conn),
        })
    } else {
        let mut tx = conn.begin().await?;
        if read_only {
            sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *tx).await?;
        }
        Ok(Cursor {
            tx: Some(tx),
            conn: None,
        })
    }
}

/// Safe to call at interpreter/process shutdown: closes the pool if one was
/// ever created.
pub async fn close_pool() {
    let mut guard = pool_cell().lock().await;
    if let Some(pool) = guard.take() {
        pool.close().await;
    }
}

/// Convenience wrapper used by callers that only need the migrations dir
/// overridden (tests, alternate deployments).
pub async fn ensure_schema_at(pool: &PgPool, migrations_dir: &Path) -> Result<(), StoreError> {
    let schema = get_schema_name()?;
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\""))
        .execute(pool)
        .await?;
    migrate::migrate_up(pool, migrations_dir).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_name_rejects_invalid_identifiers() {
        std::env::set_var(ENV_SCHEMA_NAME, "1bad");
        assert!(get_schema_name().is_err());
        std::env::set_var(ENV_SCHEMA_NAME, "valid_schema");
        assert_eq!(get_schema_name().unwrap(), "valid_schema");
        std::env::remove_var(ENV_SCHEMA_NAME);
    }

    #[test]
    fn schema_name_defaults_to_public() {
        std::env::remove_var(ENV_SCHEMA_NAME);
        assert_eq!(get_schema_name().unwrap(), DEFAULT_SCHEMA);
    }
}
