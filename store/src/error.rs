//! Store-layer error type.
//!
//! Mirrors the `StoreError` shape the rest of the workspace already uses
//! (`Storage(String)` / `NotFound(String)`), extended with the kinds named
//! in spec §7 that are specific to the store boundary.

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage: {0}")]
    Storage(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("guarded_denied: {0}")]
    GuardedDenied(String),
    #[error("invalid migration set: {0}")]
    InvalidMigration(String),
    #[error("external unavailable: {0}")]
    ExternalUnavailable(String),
    /// An expected upsert returned no row — mirrors `RowMissingError` /
    /// `_require_row` in `original_source/agent_ops_store.py`.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            other => StoreError::Storage(other.to_string()),
        }
    }
}
