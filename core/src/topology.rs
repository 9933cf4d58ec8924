//! Topology approval state machine (spec §4.G): `{pending, approved,
//! rejected, expired}`, dedup by `arch_hash`, TTL expiry, archival, atomic
//! guarded transitions.
//!
//! Grounded in `original_source/归档/topology_approval.py`. Its Go-migration
//! planning comments are not carried over. The Chinese error text
//! (`审批单状态不可批准: ...`) is preserved verbatim — it is user-facing
//! protocol text, not an internal comment.

use std::io::Write as _;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::audit::{append_event, AppendEvent};
use crate::error::BusResult;

pub const APPROVAL_ID_HEX_LEN: usize = 16;
pub const DEFAULT_TTL_SEC: i64 = 120;
pub const MIN_TTL_SEC: i64 = 30;
pub const DEFAULT_ARCHIVE_DAYS: i64 = 30;
pub const MIN_ARCHIVE_DAYS: i64 = 1;
const APPROVAL_EXPIRE_NOTE: &str = "审批超时自动过期";
const APPROVAL_EXPIRE_ACTOR: &str = "system";
const XDG_APP_NAME: &str = "orchestrator-bus";
const TOPOLOGY_FILENAME: &str = "topology.json";

static APPROVAL_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-f0-9]{16}$").unwrap());

pub fn is_valid_approval_id(value: &str) -> bool {
    APPROVAL_ID_RE.is_match(value)
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApprovalRequest {
    pub id: String,
    pub status: String,
    pub requested_by: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer: String,
    pub review_note: String,
    pub arch_hash: String,
    pub proposed_architecture: Value,
}

const REQUEST_COLUMNS: &str = "id, status, requested_by, reason, created_at, expire_at, \
    reviewed_at, reviewer, review_note, arch_hash, proposed_architecture";

fn canonical_json(value: &Value) -> String {
    fn write(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                out.push('{');
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::to_string(key).unwrap());
                    out.push(':');
                    write(&map[*key], out);
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write(item, out);
                }
                out.push(']');
            }
            other => out.push_str(&other.to_string()),
        }
    }
    let mut out = String::new();
    write(value, &mut out);
    out
}

fn arch_hash(architecture: &Value) -> String {
    let raw = canonical_json(architecture);
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn is_valid_architecture(architecture: &Value) -> bool {
    let Value::Object(_) = architecture else { return false };
    let Some(Value::Array(gateways)) = architecture.get("gateways") else { return false };
    if gateways.is_empty() {
        return false;
    }
    for gateway in gateways {
        let Value::Object(_) = gateway else { return false };
        let id_ok = gateway.get("id").and_then(Value::as_str).map(|s| !s.trim().is_empty()).unwrap_or(false);
        if !id_ok {
            return false;
        }
        let Some(Value::Array(agents)) = gateway.get("agents") else { return false };
        if agents.is_empty() {
            return false;
        }
        for agent in agents {
            let Value::Object(_) = agent else { return false };
            let agent_id_ok = agent.get("id").and_then(Value::as_str).map(|s| !s.trim().is_empty()).unwrap_or(false);
            if !agent_id_ok {
                return false;
            }
        }
    }
    true
}

fn as_architecture(value: &Value) -> Value {
    if value.is_object() {
        return value.clone();
    }
    if let Some(text) = value.as_str() {
        if let Ok(parsed) = serde_json::from_str::<Value>(text) {
            if parsed.is_object() {
                return parsed;
            }
        }
    }
    serde_json::json!({"gateways": []})
}

fn topology_file_path() -> BusResult<std::path::PathBuf> {
    let base = cross_xdg::BaseDirs::new()
        .map_err(|e| crate::error::BusError::InternalInvariant(format!("XDG base dirs unavailable: {e}")))?;
    Ok(base.state_home().join(XDG_APP_NAME).join(TOPOLOGY_FILENAME))
}

/// Reads the currently-effective topology JSON, or `{"gateways": []}` if no
/// file exists yet.
pub fn load_architecture_raw() -> BusResult<Value> {
    let path = topology_file_path()?;
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(as_architecture(&Value::String(text))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(serde_json::json!({"gateways": []})),
        Err(e) => Err(crate::error::BusError::InternalInvariant(format!(
            "failed to read topology file: {e}"
        ))),
    }
}

/// Writes `architecture` as the effective topology, atomically (temp file +
/// rename). When `TOPOLOGY_BACKUP_ENABLED` is truthy and a previous file
/// exists, it is copied to a timestamped sibling first; returns that backup
/// path, or an empty string when no backup was made.
pub fn save_architecture(architecture: &Value) -> BusResult<String> {
    let path = topology_file_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| crate::error::BusError::InternalInvariant(format!("failed to create topology dir: {e}")))?;
    }

    let mut backup_path = String::new();
    if config::as_bool_env("TOPOLOGY_BACKUP_ENABLED", true) && path.exists() {
        let stamp = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let backup = path.with_file_name(format!("{TOPOLOGY_FILENAME}.bak-{stamp}"));
        std::fs::copy(&path, &backup)
            .map_err(|e| crate::error::BusError::InternalInvariant(format!("failed to back up topology file: {e}")))?;
        backup_path = backup.to_string_lossy().into_owned();
    }

    let tmp_path = path.with_extension("json.tmp");
    let mut tmp_file = std::fs::File::create(&tmp_path)
        .map_err(|e| crate::error::BusError::InternalInvariant(format!("failed to create temp topology file: {e}")))?;
    tmp_file
        .write_all(serde_json::to_string_pretty(architecture).unwrap().as_bytes())
        .map_err(|e| crate::error::BusError::InternalInvariant(format!("failed to write temp topology file: {e}")))?;
    std::fs::rename(&tmp_path, &path)
        .map_err(|e| crate::error::BusError::InternalInvariant(format!("failed to install topology file: {e}")))?;

    Ok(backup_path)
}

fn resolve_ttl_sec(ttl_sec: Option<i64>) -> i64 {
    match ttl_sec {
        Some(v) => v.max(MIN_TTL_SEC),
        None => config::as_int_env("TOPOLOGY_APPROVAL_TTL_SEC", DEFAULT_TTL_SEC, MIN_TTL_SEC, i64::MAX),
    }
}

fn resolve_archive_days() -> i64 {
    config::as_int_env("TOPOLOGY_APPROVAL_ARCHIVE_DAYS", DEFAULT_ARCHIVE_DAYS, MIN_ARCHIVE_DAYS, i64::MAX)
}

async fn expire_requests(pool: &PgPool) -> BusResult<u64> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "UPDATE topology_approvals
         SET status = 'expired', reviewed_at = NOW(), reviewer = $1, review_note = $2
         WHERE status = 'pending' AND expire_at < NOW()
         RETURNING id, reason",
    )
    .bind(APPROVAL_EXPIRE_ACTOR)
    .bind(APPROVAL_EXPIRE_NOTE)
    .fetch_all(pool)
    .await?;

    for (id, reason) in &rows {
        append_event(
            pool,
            AppendEvent {
                event_type: "topology_approval".to_string(),
                action: "expire".to_string(),
                result: "expired".to_string(),
                actor: APPROVAL_EXPIRE_ACTOR.to_string(),
                target: id.clone(),
                detail: reason.clone(),
                level: "WARN".to_string(),
                extra: None,
            },
        )
        .await?;
    }

    Ok(rows.len() as u64)
}

async fn archive_completed_requests(pool: &PgPool) -> BusResult<u64> {
    let archive_days = resolve_archive_days();
    let rows: Vec<(String,)> = sqlx::query_as(
        "WITH moved AS (
            DELETE FROM topology_approvals
            WHERE status IN ('approved', 'rejected', 'expired')
              AND COALESCE(reviewed_at, created_at) < NOW() - ($1 * INTERVAL '1 day')
            RETURNING id, status, requested_by, reason, created_at, expire_at,
                      reviewed_at, reviewer, review_note, arch_hash, proposed_architecture
        )
        INSERT INTO topology_approval_archives (
            id, status, requested_by, reason, created_at, expire_at,
            reviewed_at, reviewer, review_note, arch_hash, proposed_architecture, archived_at
        )
        SELECT id, status, requested_by, reason, created_at, expire_at,
               reviewed_at, reviewer, review_note, arch_hash, proposed_architecture, NOW()
        FROM moved
        ON CONFLICT (id) DO NOTHING
        RETURNING id",
    )
    .bind(archive_days)
    .fetch_all(pool)
    .await?;

    let count = rows.len() as u64;
    if count > 0 {
        append_event(
            pool,
            AppendEvent {
                event_type: "topology_approval".to_string(),
                action: "archive".to_string(),
                result: "ok".to_string(),
                actor: "system".to_string(),
                target: "archive".to_string(),
                detail: format!("archived={count}"),
                level: "INFO".to_string(),
                extra: None,
            },
        )
        .await?;
    }
    Ok(count)
}

pub async fn list_approvals(pool: &PgPool, status: &str, limit: Option<i64>) -> BusResult<Vec<ApprovalRequest>> {
    expire_requests(pool).await?;
    archive_completed_requests(pool).await?;

    let max_items = config::normalize_limit(limit, 50, 1000);
    let rows: Vec<ApprovalRequest> = if status.is_empty() {
        sqlx::query_as(&format!(
            "SELECT {REQUEST_COLUMNS} FROM topology_approvals ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(max_items)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as(&format!(
            "SELECT {REQUEST_COLUMNS} FROM topology_approvals WHERE status = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(status)
        .bind(max_items)
        .fetch_all(pool)
        .await?
    };
    Ok(rows)
}

pub async fn get_approval(pool: &PgPool, approval_id: &str) -> BusResult<Option<ApprovalRequest>> {
    expire_requests(pool).await?;
    archive_completed_requests(pool).await?;

    Ok(
        sqlx::query_as(&format!("SELECT {REQUEST_COLUMNS} FROM topology_approvals WHERE id = $1"))
            .bind(approval_id)
            .fetch_optional(pool)
            .await?,
    )
}

pub struct CreateOutcome {
    pub ok: bool,
    pub deduped: bool,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub request: Option<ApprovalRequest>,
}

pub async fn create_approval(
    pool: &PgPool,
    proposed_architecture: Value,
    requested_by: &str,
    reason: &str,
    ttl_sec: Option<i64>,
) -> BusResult<CreateOutcome> {
    expire_requests(pool).await?;
    archive_completed_requests(pool).await?;

    if !is_valid_architecture(&proposed_architecture) {
        append_event(
            pool,
            AppendEvent {
                event_type: "topology_approval".to_string(),
                action: "create".to_string(),
                result: "invalid_input".to_string(),
                actor: requested_by.to_string(),
                target: "architecture".to_string(),
                detail: "proposed architecture is malformed".to_string(),
                level: "WARN".to_string(),
                extra: None,
            },
        )
        .await?;
        return Ok(CreateOutcome {
            ok: false,
            deduped: false,
            reason: Some("invalid_architecture".to_string()),
            message: Some("proposed architecture is malformed".to_string()),
            request: None,
        });
    }

    let current = load_architecture_raw()?;
    let proposed_hash = arch_hash(&proposed_architecture);
    let current_hash = arch_hash(&current);

    if proposed_hash == current_hash {
        append_event(
            pool,
            AppendEvent {
                event_type: "topology_approval".to_string(),
                action: "create".to_string(),
                result: "skipped".to_string(),
                actor: requested_by.to_string(),
                target: "architecture".to_string(),
                detail: "proposal matches current topology".to_string(),
                level: "INFO".to_string(),
                extra: None,
            },
        )
        .await?;
        return Ok(CreateOutcome {
            ok: false,
            deduped: false,
            reason: Some("no_change".to_string()),
            message: Some("proposal matches current topology, no approval needed".to_string()),
            request: None,
        });
    }

    let dup: Option<ApprovalRequest> = sqlx::query_as(&format!(
        "SELECT {REQUEST_COLUMNS} FROM topology_approvals WHERE status = 'pending' AND arch_hash = $1 ORDER BY created_at DESC LIMIT 1"
    ))
    .bind(&proposed_hash)
    .fetch_optional(pool)
    .await?;

    if let Some(dup) = dup {
        append_event(
            pool,
            AppendEvent {
                event_type: "topology_approval".to_string(),
                action: "create".to_string(),
                result: "deduped".to_string(),
                actor: requested_by.to_string(),
                target: dup.id.clone(),
                detail: "reused existing pending proposal".to_string(),
                level: "INFO".to_string(),
                extra: None,
            },
        )
        .await?;
        return Ok(CreateOutcome {
            ok: true,
            deduped: true,
            reason: None,
            message: None,
            request: Some(dup),
        });
    }

    let ttl_value = resolve_ttl_sec(ttl_sec);
    let approval_id = uuid::Uuid::new_v4().simple().to_string()[..APPROVAL_ID_HEX_LEN].to_string();

    let row: Option<ApprovalRequest> = sqlx::query_as(&format!(
        "INSERT INTO topology_approvals (id, status, requested_by, reason, created_at, expire_at, reviewed_at, reviewer, review_note, arch_hash, proposed_architecture)
         VALUES ($1, 'pending', $2, $3, NOW(), NOW() + ($4 * INTERVAL '1 second'), NULL, '', '', $5, $6)
         RETURNING {REQUEST_COLUMNS}"
    ))
    .bind(&approval_id)
    .bind(requested_by)
    .bind(reason)
    .bind(ttl_value)
    .bind(&proposed_hash)
    .bind(&proposed_architecture)
    .fetch_optional(pool)
    .await?;

    let request = store::require_row(row, "create_approval")?;

    append_event(
        pool,
        AppendEvent {
            event_type: "topology_approval".to_string(),
            action: "create".to_string(),
            result: "pending".to_string(),
            actor: requested_by.to_string(),
            target: request.id.clone(),
            detail: reason.to_string(),
            level: "INFO".to_string(),
            extra: Some(serde_json::json!({"ttl_sec": ttl_value})),
        },
    )
    .await?;

    Ok(CreateOutcome {
        ok: true,
        deduped: false,
        reason: None,
        message: None,
        request: Some(request),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub ok: bool,
    pub message: Option<String>,
    pub request: Option<ApprovalRequest>,
    pub config_backup: Option<String>,
}

async fn transition_approval(
    pool: &PgPool,
    approval_id: &str,
    target_status: &str,
    reviewer: &str,
    note: &str,
) -> BusResult<TransitionOutcome> {
    let action = if target_status == "approved" { "approve" } else { "reject" };
    let state_verb = if target_status == "approved" { "批准" } else { "拒绝" };

    expire_requests(pool).await?;
    archive_completed_requests(pool).await?;

    let mut cursor = store::connect_cursor(pool, false, false).await?;
    let tx = cursor.tx.as_mut().expect("connect_cursor(autocommit=false) always returns a transaction");

    let target: Option<ApprovalRequest> = sqlx::query_as(&format!(
        "UPDATE topology_approvals SET status = $1, reviewed_at = NOW(), reviewer = $2, review_note = $3
         WHERE id = $4 AND status = 'pending' AND expire_at >= NOW()
         RETURNING {REQUEST_COLUMNS}"
    ))
    .bind(target_status)
    .bind(reviewer)
    .bind(note)
    .bind(approval_id)
    .fetch_optional(&mut **tx)
    .await?;

    let mut config_backup = None;
    let (request, transition_result, failure_status) = if let Some(target) = target {
        if target_status == "approved" {
            let backup = save_architecture(&as_architecture(&target.proposed_architecture))?;
            config_backup = Some(backup);
        }
        (Some(target), target_status.to_string(), String::new())
    } else {
        let expired: Option<ApprovalRequest> = sqlx::query_as(&format!(
            "UPDATE topology_approvals SET status = 'expired', reviewed_at = NOW(), reviewer = $1, review_note = $2
             WHERE id = $3 AND status = 'pending' AND expire_at < NOW()
             RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(APPROVAL_EXPIRE_ACTOR)
        .bind(APPROVAL_EXPIRE_NOTE)
        .bind(approval_id)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(expired) = expired {
            (Some(expired), "expired".to_string(), "expired".to_string())
        } else {
            let current: Option<(String,)> = sqlx::query_as("SELECT status FROM topology_approvals WHERE id = $1")
                .bind(approval_id)
                .fetch_optional(&mut **tx)
                .await?;
            match current {
                None => (None, "not_found".to_string(), String::new()),
                Some((status,)) => (None, "invalid_state".to_string(), status),
            }
        }
    };

    cursor.tx.take().unwrap().commit().await?;

    if transition_result == "not_found" {
        append_event(
            pool,
            AppendEvent {
                event_type: "topology_approval".to_string(),
                action: action.to_string(),
                result: "not_found".to_string(),
                actor: reviewer.to_string(),
                target: approval_id.to_string(),
                detail: "approval not found".to_string(),
                level: "WARN".to_string(),
                extra: None,
            },
        )
        .await?;
        return Ok(TransitionOutcome {
            ok: false,
            message: Some(format!("审批单不存在: {approval_id}")),
            request: None,
            config_backup: None,
        });
    }

    if transition_result == "invalid_state" || transition_result == "expired" {
        if transition_result == "expired" {
            append_event(
                pool,
                AppendEvent {
                    event_type: "topology_approval".to_string(),
                    action: "expire".to_string(),
                    result: "expired".to_string(),
                    actor: APPROVAL_EXPIRE_ACTOR.to_string(),
                    target: approval_id.to_string(),
                    detail: request.as_ref().map(|r| r.reason.clone()).unwrap_or_default(),
                    level: "WARN".to_string(),
                    extra: None,
                },
            )
            .await?;
        }
        append_event(
            pool,
            AppendEvent {
                event_type: "topology_approval".to_string(),
                action: action.to_string(),
                result: "invalid_state".to_string(),
                actor: reviewer.to_string(),
                target: approval_id.to_string(),
                detail: format!("current status: {failure_status}"),
                level: "WARN".to_string(),
                extra: None,
            },
        )
        .await?;
        let status_display = if transition_result == "expired" { "expired" } else { failure_status.as_str() };
        return Ok(TransitionOutcome {
            ok: false,
            message: Some(format!("审批单状态不可{state_verb}: {status_display}")),
            request: None,
            config_backup: None,
        });
    }

    let request = request.expect("ok transition always carries a request row");

    let extra = config_backup.as_ref().filter(|b| !b.is_empty()).map(|b| serde_json::json!({"config_backup": b}));
    append_event(
        pool,
        AppendEvent {
            event_type: "topology_approval".to_string(),
            action: action.to_string(),
            result: target_status.to_string(),
            actor: reviewer.to_string(),
            target: approval_id.to_string(),
            detail: note.to_string(),
            level: "INFO".to_string(),
            extra,
        },
    )
    .await?;

    Ok(TransitionOutcome {
        ok: true,
        message: None,
        request: Some(request),
        config_backup,
    })
}

pub async fn approve_approval(pool: &PgPool, approval_id: &str, reviewer: &str, note: &str) -> BusResult<TransitionOutcome> {
    transition_approval(pool, approval_id, "approved", reviewer, note).await
}

pub async fn reject_approval(pool: &PgPool, approval_id: &str, reviewer: &str, note: &str) -> BusResult<TransitionOutcome> {
    transition_approval(pool, approval_id, "rejected", reviewer, note).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_id_rejects_wrong_shape() {
        assert!(is_valid_approval_id("0123456789abcdef"));
        assert!(!is_valid_approval_id("0123456789ABCDEF"));
        assert!(!is_valid_approval_id("short"));
    }

    #[test]
    fn canonical_json_sorts_keys_regardless_of_input_order() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn arch_hash_changes_with_content() {
        let a = serde_json::json!({"gateways": []});
        let b = serde_json::json!({"gateways": [{"id": "g1", "agents": []}]});
        assert_ne!(arch_hash(&a), arch_hash(&b));
    }

    #[test]
    fn valid_architecture_requires_gateway_and_agent_ids() {
        assert!(!is_valid_architecture(&serde_json::json!({"gateways": []})));
        assert!(!is_valid_architecture(&serde_json::json!({"gateways": [{"id": "", "agents": []}]})));
        assert!(is_valid_architecture(&serde_json::json!({
            "gateways": [{"id": "g1", "agents": [{"id": "a1"}]}]
        })));
    }
}
