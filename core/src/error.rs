//! Crate-wide error kind shared by every component (spec §7): one
//! `thiserror` enum with a `http_status` and a `tool_envelope` so HTTP
//! handlers and tool-call dispatch share one source of truth instead of
//! re-deriving status codes ad hoc.

use axum::http::StatusCode;
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("state_conflict: {0}")]
    StateConflict(String),
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("guarded_denied: {0}")]
    GuardedDenied(String),
    #[error("external_unavailable: {0}")]
    ExternalUnavailable(String),
    #[error("internal_invariant: {0}")]
    InternalInvariant(String),
}

impl BusError {
    pub fn kind(&self) -> &'static str {
        match self {
            BusError::Validation(_) => "validation",
            BusError::StateConflict(_) => "state_conflict",
            BusError::NotFound(_) => "not_found",
            BusError::GuardedDenied(_) => "guarded_denied",
            BusError::ExternalUnavailable(_) => "external_unavailable",
            BusError::InternalInvariant(_) => "internal_invariant",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            BusError::Validation(_) | BusError::StateConflict(_) | BusError::GuardedDenied(_) => {
                StatusCode::BAD_REQUEST
            }
            BusError::NotFound(_) => StatusCode::NOT_FOUND,
            BusError::ExternalUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            BusError::InternalInvariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `{ok:false, error}` shape every tool call returns instead of
    /// propagating an exception (spec §7's "exceptions → result envelopes").
    pub fn tool_envelope(&self) -> Value {
        json!({ "ok": false, "error": self.to_string(), "kind": self.kind() })
    }
}

impl From<store::StoreError> for BusError {
    fn from(e: store::StoreError) -> Self {
        match e {
            store::StoreError::Storage(m) => BusError::ExternalUnavailable(m),
            store::StoreError::NotFound(m) => BusError::NotFound(m),
            store::StoreError::Validation(m) => BusError::Validation(m),
            store::StoreError::GuardedDenied(m) => BusError::GuardedDenied(m),
            store::StoreError::InvalidMigration(m) => BusError::ExternalUnavailable(m),
            store::StoreError::ExternalUnavailable(m) => BusError::ExternalUnavailable(m),
            store::StoreError::InternalInvariant(m) => BusError::InternalInvariant(m),
        }
    }
}

impl From<sqlx::Error> for BusError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => BusError::NotFound("row not found".to_string()),
            other => BusError::ExternalUnavailable(other.to_string()),
        }
    }
}

pub type BusResult<T> = Result<T, BusError>;
