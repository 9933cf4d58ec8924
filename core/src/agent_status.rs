//! Agent-status store (spec §4.C): upsert-by-key health snapshots.
//!
//! Grounded in `original_source/agent_status_store.py`: `output_tail` is
//! trimmed to non-blank lines and capped at 50, `stagnant_sec` rejects
//! negatives, and `status` is a closed six-value set.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::common::{clamp_limit, validate_agent_id};
use crate::error::{BusError, BusResult};

pub const MAX_OUTPUT_LINES: usize = 50;
pub const ALLOWED_STATUSES: &[&str] = &["running", "idle", "stuck", "error", "disconnected", "unknown"];

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AgentStatus {
    pub agent_id: String,
    pub agent_name: String,
    pub session_id: String,
    pub status: String,
    pub stagnant_sec: i32,
    pub error: String,
    #[sqlx(json)]
    pub output_tail: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn normalize_status(status: &str) -> BusResult<String> {
    let text = status.trim().to_lowercase();
    let text = if text.is_empty() { "unknown".to_string() } else { text };
    if ALLOWED_STATUSES.contains(&text.as_str()) {
        Ok(text)
    } else {
        Err(BusError::Validation(format!("invalid status: {status}")))
    }
}

/// Trims blank lines and keeps only the last [`MAX_OUTPUT_LINES`].
pub fn normalize_output_tail(lines: &[String]) -> Vec<String> {
    let trimmed: Vec<String> = lines
        .iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    if trimmed.len() > MAX_OUTPUT_LINES {
        trimmed[trimmed.len() - MAX_OUTPUT_LINES..].to_vec()
    } else {
        trimmed
    }
}

#[derive(Debug, Default, Clone)]
pub struct UpsertAgentStatus {
    pub agent_id: String,
    pub agent_name: String,
    pub session_id: String,
    pub status: String,
    pub stagnant_sec: i64,
    pub error: String,
    pub output_tail: Vec<String>,
}

pub async fn upsert_agent_status(pool: &PgPool, input: UpsertAgentStatus) -> BusResult<AgentStatus> {
    validate_agent_id(&input.agent_id)?;
    let status = normalize_status(&input.status)?;
    if input.stagnant_sec < 0 {
        return Err(BusError::Validation("stagnant_sec cannot be negative".to_string()));
    }
    let output_tail = normalize_output_tail(&input.output_tail);
    let output_json = serde_json::to_value(&output_tail).unwrap();

    let row: Option<AgentStatus> = sqlx::query_as(
        "INSERT INTO agent_status (agent_id, agent_name, session_id, status, stagnant_sec, error, output_tail, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
         ON CONFLICT (agent_id) DO UPDATE SET
             agent_name = EXCLUDED.agent_name,
             session_id = EXCLUDED.session_id,
             status = EXCLUDED.status,
             stagnant_sec = EXCLUDED.stagnant_sec,
             error = EXCLUDED.error,
             output_tail = EXCLUDED.output_tail,
             updated_at = NOW()
         RETURNING agent_id, agent_name, session_id, status, stagnant_sec, error, output_tail, created_at, updated_at",
    )
    .bind(&input.agent_id)
    .bind(&input.agent_name)
    .bind(&input.session_id)
    .bind(&status)
    .bind(input.stagnant_sec as i32)
    .bind(&input.error)
    .bind(&output_json)
    .fetch_optional(pool)
    .await?;

    store::require_row(row, "upsert_agent_status").map_err(BusError::from)
}

#[derive(Debug, Default, Clone)]
pub struct QueryAgentStatus {
    pub agent_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn query_agent_status(pool: &PgPool, q: QueryAgentStatus) -> BusResult<Vec<AgentStatus>> {
    let mut where_clauses: Vec<String> = Vec::new();
    let mut agent_id = None;
    let mut status = None;

    if let Some(aid) = &q.agent_id {
        validate_agent_id(aid)?;
        where_clauses.push(format!("agent_id = ${}", where_clauses.len() + 1));
        agent_id = Some(aid.clone());
    }
    if let Some(s) = &q.status {
        let normalized = normalize_status(s)?;
        where_clauses.push(format!("status = ${}", where_clauses.len() + 1));
        status = Some(normalized);
    }

    let mut sql = String::from(
        "SELECT agent_id, agent_name, session_id, status, stagnant_sec, error, output_tail, created_at, updated_at FROM agent_status",
    );
    if !where_clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clauses.join(" AND "));
    }
    sql.push_str(&format!(
        " ORDER BY updated_at DESC, agent_id ASC LIMIT ${}",
        where_clauses.len() + 1
    ));

    let mut query = sqlx::query_as::<_, AgentStatus>(&sql);
    if let Some(aid) = &agent_id {
        query = query.bind(aid);
    }
    if let Some(s) = &status {
        query = query.bind(s);
    }
    query = query.bind(clamp_limit(q.limit));

    Ok(query.fetch_all(pool).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_tail_trims_blanks_and_caps_at_fifty() {
        let mut lines: Vec<String> = (0..60).map(|i| format!("line {i}")).collect();
        lines.push("".to_string());
        lines.push("   ".to_string());
        let normalized = normalize_output_tail(&lines);
        assert_eq!(normalized.len(), MAX_OUTPUT_LINES);
        assert_eq!(normalized.last().unwrap(), "line 59");
    }

    #[test]
    fn status_rejects_unknown_values() {
        assert!(normalize_status("bogus").is_err());
        assert_eq!(normalize_status("").unwrap(), "unknown");
        assert_eq!(normalize_status("RUNNING").unwrap(), "running");
    }
}
