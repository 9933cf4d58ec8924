//! Path-keyed shared-file store (spec §4.D).
//!
//! Grounded in `original_source/shared_file_store.py`: path normalization,
//! upsert-by-path, prefix listing with an escaped `LIKE`, and an audit event
//! on every write/delete.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::audit::{append_event, AppendEvent};
use crate::common::{escape_like_chars, normalize_path};
use crate::error::BusResult;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SharedFile {
    pub path: String,
    pub content: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn write_file(pool: &PgPool, path: &str, content: &str, actor: &str) -> BusResult<SharedFile> {
    let file_path = normalize_path(path)?;

    sqlx::query(
        "INSERT INTO shared_files (path, content, updated_by, created_at, updated_at)
         VALUES ($1, $2, $3, NOW(), NOW())
         ON CONFLICT (path) DO UPDATE SET content = EXCLUDED.content, updated_by = EXCLUDED.updated_by, updated_at = NOW()",
    )
    .bind(&file_path)
    .bind(content)
    .bind(actor)
    .execute(pool)
    .await?;

    append_event(
        pool,
        AppendEvent {
            event_type: "file_share".to_string(),
            action: "write".to_string(),
            result: "ok".to_string(),
            actor: actor.to_string(),
            target: file_path.clone(),
            detail: format!("size={}", content.len()),
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    read_file(pool, &file_path)
        .await?
        .ok_or_else(|| crate::error::BusError::InternalInvariant("write_file: row vanished after write".to_string()))
}

pub async fn read_file(pool: &PgPool, path: &str) -> BusResult<Option<SharedFile>> {
    let file_path = normalize_path(path)?;
    let row: Option<SharedFile> = sqlx::query_as(
        "SELECT path, content, updated_by, created_at, updated_at FROM shared_files WHERE path = $1",
    )
    .bind(&file_path)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn list_files(pool: &PgPool, prefix: &str, limit: Option<i64>) -> BusResult<Vec<SharedFile>> {
    let max_items = config::normalize_limit(limit, 200, 1000);

    let rows: Vec<SharedFile> = if prefix.is_empty() {
        sqlx::query_as(
            "SELECT path, content, updated_by, created_at, updated_at FROM shared_files ORDER BY updated_at DESC, path ASC LIMIT $1",
        )
        .bind(max_items)
        .fetch_all(pool)
        .await?
    } else {
        let normalized_prefix = normalize_path(prefix)?;
        let pattern = format!("{}%", escape_like_chars(&normalized_prefix));
        sqlx::query_as(
            "SELECT path, content, updated_by, created_at, updated_at FROM shared_files WHERE path LIKE $1 ESCAPE '\\' ORDER BY updated_at DESC, path ASC LIMIT $2",
        )
        .bind(pattern)
        .bind(max_items)
        .fetch_all(pool)
        .await?
    };

    Ok(rows)
}

pub async fn delete_file(pool: &PgPool, path: &str, actor: &str) -> BusResult<bool> {
    let file_path = normalize_path(path)?;
    let result = sqlx::query("DELETE FROM shared_files WHERE path = $1")
        .bind(&file_path)
        .execute(pool)
        .await?;
    let deleted = result.rows_affected() > 0;

    append_event(
        pool,
        AppendEvent {
            event_type: "file_share".to_string(),
            action: "delete".to_string(),
            result: if deleted { "ok".to_string() } else { "not_found".to_string() },
            actor: actor.to_string(),
            target: file_path,
            detail: String::new(),
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_folds_backslashes_and_strips_slashes() {
        assert_eq!(normalize_path("/a\\b/c/").unwrap(), "a/b/c");
        assert!(normalize_path("///").is_err());
        assert!(normalize_path("").is_err());
    }
}
