//! Migration discovery and runner.
//!
//! Discovery/validation rules are a direct port of `original_source/db/migrator.py`:
//! files must match `^(\d{4})_([a-z0-9_]+)\.sql$`, versions must be unique and
//! strictly contiguous starting at 1. Down-migrations are intentionally
//! unsupported.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::PgPool;

use crate::error::StoreError;

static MIGRATION_FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})_([a-z0-9_]+)\.sql$").unwrap());

#[derive(Clone, Debug)]
pub struct Migration {
    pub version: u32,
    pub name: String,
    pub filename: String,
    pub path: PathBuf,
}

/// Default migrations directory, relative to the process working directory.
/// Overridable via `STORE_MIGRATIONS_DIR` for deployments that install
/// migrations elsewhere.
pub fn default_migrations_dir() -> PathBuf {
    std::env::var("STORE_MIGRATIONS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
}

/// Scans `dir` for migration files, validating filename shape, uniqueness,
/// and contiguity. Returns migrations sorted by version ascending.
pub fn discover_migrations(dir: &Path) -> Result<Vec<Migration>, StoreError> {
    let mut found = Vec::new();
    let entries = std::fs::read_dir(dir)
        .map_err(|e| StoreError::InvalidMigration(format!("read {}: {e}", dir.display())))?;

    for entry in entries {
        let entry = entry.map_err(|e| StoreError::InvalidMigration(e.to_string()))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(caps) = MIGRATION_FILENAME_RE.captures(name) else {
            continue;
        };
        let version: u32 = caps[1].parse().map_err(|_| {
            StoreError::InvalidMigration(format!("bad version in filename: {name}"))
        })?;
        found.push(Migration {
            version,
            name: caps[2].to_string(),
            filename: name.to_string(),
            path: entry.path(),
        });
    }

    found.sort_by_key(|m| m.version);

    let mut seen = std::collections::HashSet::new();
    for m in &found {
        if !seen.insert(m.version) {
            return Err(StoreError::InvalidMigration(format!(
                "duplicate migration version {}",
                m.version
            )));
        }
    }

    for (idx, m) in found.iter().enumerate() {
        let expected = (idx + 1) as u32;
        if m.version != expected {
            return Err(StoreError::InvalidMigration(format!(
                "non-contiguous migration versions: expected {expected}, found {}",
                m.version
            )));
        }
    }

    Ok(found)
}

async fn ensure_bookkeeping_table(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            filename TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn applied_versions(pool: &PgPool) -> Result<std::collections::HashSet<u32>, StoreError> {
    let rows: Vec<(i32,)> = sqlx::query_as("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(v,)| v as u32).collect())
}

/// Applies every pending migration in numeric order, on one connection,
/// recording each applied version in `schema_migrations`.
pub async fn migrate_up(pool: &PgPool, dir: &Path) -> Result<usize, StoreError> {
    ensure_bookkeeping_table(pool).await?;
    let migrations = discover_migrations(dir)?;
    let already = applied_versions(pool).await?;

    let mut applied = 0usize;
    for m in migrations.into_iter().filter(|m| !already.contains(&m.version)) {
        let sql = std::fs::read_to_string(&m.path)
            .map_err(|e| StoreError::InvalidMigration(format!("read {}: {e}", m.filename)))?;
        let mut conn = pool.acquire().await?;
        sqlx::raw_sql(&sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| StoreError::Storage(format!("migration {} failed: {e}", m.filename)))?;
        sqlx::query(
            "INSERT INTO schema_migrations (version, name, filename) VALUES ($1, $2, $3)",
        )
        .bind(m.version as i32)
        .bind(&m.name)
        .bind(&m.filename)
        .execute(&mut *conn)
        .await?;
        tracing::info!(version = m.version, filename = %m.filename, "applied migration");
        applied += 1;
    }

    Ok(applied)
}

/// Down-migrations are intentionally unsupported (spec §4.A).
pub fn migrate_down() -> Result<(), StoreError> {
    Err(StoreError::Validation(
        "down migrations are not supported".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str) {
        fs::write(dir.join(name), "-- noop\nSELECT 1;\n").unwrap();
    }

    #[test]
    fn discover_sorts_and_accepts_contiguous() {
        let dir = tempfile_dir();
        write(&dir, "0002_second.sql");
        write(&dir, "0001_first.sql");
        let migrations = discover_migrations(&dir).unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].version, 1);
        assert_eq!(migrations[1].version, 2);
    }

    #[test]
    fn discover_rejects_duplicate_versions() {
        let dir = tempfile_dir();
        write(&dir, "0001_first.sql");
        write(&dir, "0001_again.sql");
        let err = discover_migrations(&dir).unwrap_err();
        assert!(matches!(err, StoreError::InvalidMigration(_)));
    }

    #[test]
    fn discover_rejects_non_contiguous_versions() {
        let dir = tempfile_dir();
        write(&dir, "0001_first.sql");
        write(&dir, "0003_third.sql");
        let err = discover_migrations(&dir).unwrap_err();
        assert!(matches!(err, StoreError::InvalidMigration(_)));
    }

    #[test]
    fn discover_ignores_non_matching_files() {
        let dir = tempfile_dir();
        write(&dir, "0001_first.sql");
        write(&dir, "README.md");
        write(&dir, "not_a_migration.sql");
        let migrations = discover_migrations(&dir).unwrap();
        assert_eq!(migrations.len(), 1);
    }

    fn tempfile_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "store-migrate-test-{}",
            std::process::id().wrapping_add(line!())
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
