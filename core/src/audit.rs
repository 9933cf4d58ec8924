//! Append-only audit/system-log sink (spec §4.B).
//!
//! Grounded in `original_source/audit_log.py`: `append_event` always
//! succeeds with normalized fields; `query_events` supports a 7-column
//! case-insensitive keyword search with `escape_like`-escaped `LIKE`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::common::{clamp_limit, escape_like};
use crate::error::BusResult;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub ts: DateTime<Utc>,
    pub event_type: String,
    pub action: String,
    pub result: String,
    pub actor: String,
    pub target: String,
    pub detail: String,
    pub level: String,
    pub extra: Option<Value>,
}

#[derive(Debug, Default, Clone)]
pub struct AppendEvent {
    pub event_type: String,
    pub action: String,
    pub result: String,
    pub actor: String,
    pub target: String,
    pub detail: String,
    pub level: String,
    pub extra: Option<Value>,
}

pub async fn append_event(pool: &PgPool, mut ev: AppendEvent) -> BusResult<AuditEvent> {
    if ev.event_type.trim().is_empty() {
        ev.event_type = "system".to_string();
    }
    if ev.action.trim().is_empty() {
        ev.action = "event".to_string();
    }
    if ev.result.trim().is_empty() {
        ev.result = "ok".to_string();
    }
    if ev.level.trim().is_empty() {
        ev.level = "INFO".to_string();
    }
    let event = AuditEvent {
        ts: Utc::now(),
        event_type: ev.event_type.trim().to_string(),
        action: ev.action.trim().to_string(),
        result: ev.result.trim().to_string(),
        actor: ev.actor.trim().to_string(),
        target: ev.target.trim().to_string(),
        detail: ev.detail.trim().to_string(),
        level: ev.level.trim().to_uppercase(),
        extra: ev.extra,
    };

    sqlx::query(
        "INSERT INTO audit_events (ts, event_type, action, result, actor, target, detail, level, extra)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(event.ts)
    .bind(&event.event_type)
    .bind(&event.action)
    .bind(&event.result)
    .bind(&event.actor)
    .bind(&event.target)
    .bind(&event.detail)
    .bind(&event.level)
    .bind(&event.extra)
    .execute(pool)
    .await
    .map_err(crate::error::BusError::from)?;

    Ok(event)
}

#[derive(Debug, Default, Clone)]
pub struct QueryEvents {
    pub limit: Option<i64>,
    pub event_type: String,
    pub action: String,
    pub result: String,
    pub actor: String,
    pub keyword: String,
}

pub async fn query_events(pool: &PgPool, q: QueryEvents) -> BusResult<Vec<AuditEvent>> {
    let max_items = clamp_limit(q.limit);

    let mut where_clauses: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    if !q.event_type.is_empty() {
        where_clauses.push(format!("event_type = ${}", binds.len() + 1));
        binds.push(q.event_type.clone());
    }
    if !q.action.is_empty() {
        where_clauses.push(format!("action = ${}", binds.len() + 1));
        binds.push(q.action.clone());
    }
    if !q.result.is_empty() {
        where_clauses.push(format!("result = ${}", binds.len() + 1));
        binds.push(q.result.clone());
    }
    if !q.actor.is_empty() {
        where_clauses.push(format!("actor = ${}", binds.len() + 1));
        binds.push(q.actor.clone());
    }

    let keyword_bind_index;
    if !q.keyword.is_empty() {
        let kw = format!("%{}%", escape_like(&q.keyword.to_lowercase()));
        keyword_bind_index = binds.len() + 1;
        binds.push(kw);
        where_clauses.push(format!(
            "(LOWER(event_type) LIKE ${i} ESCAPE '\\' OR LOWER(action) LIKE ${i} ESCAPE '\\' \
             OR LOWER(result) LIKE ${i} ESCAPE '\\' OR LOWER(actor) LIKE ${i} ESCAPE '\\' \
             OR LOWER(target) LIKE ${i} ESCAPE '\\' OR LOWER(detail) LIKE ${i} ESCAPE '\\' \
             OR LOWER(COALESCE(extra::text, '')) LIKE ${i} ESCAPE '\\')",
            i = keyword_bind_index
        ));
    }

    let mut sql = String::from(
        "SELECT ts, event_type, action, result, actor, target, detail, level, extra FROM audit_events",
    );
    if !where_clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clauses.join(" AND "));
    }
    sql.push_str(&format!(
        " ORDER BY ts DESC, id DESC LIMIT ${}",
        binds.len() + 1
    ));

    let mut query = sqlx::query_as::<_, (
        DateTime<Utc>,
        String,
        String,
        String,
        String,
        String,
        String,
        String,
        Option<Value>,
    )>(&sql);
    for b in &binds {
        query = query.bind(b);
    }
    query = query.bind(max_items);

    let rows = query.fetch_all(pool).await.map_err(crate::error::BusError::from)?;
    Ok(rows
        .into_iter()
        .map(
            |(ts, event_type, action, result, actor, target, detail, level, extra)| AuditEvent {
                ts,
                event_type,
                action,
                result,
                actor,
                target,
                detail,
                level,
                extra,
            },
        )
        .collect())
}

#[derive(Debug, Default, Serialize)]
pub struct FilterValues {
    pub event_types: Vec<String>,
    pub actions: Vec<String>,
    pub results: Vec<String>,
    pub actors: Vec<String>,
}

async fn distinct_non_empty(pool: &PgPool, column: &str) -> BusResult<Vec<String>> {
    let sql = format!(
        "SELECT DISTINCT {column} AS value FROM audit_events WHERE {column} <> '' ORDER BY value"
    );
    let rows: Vec<(String,)> = sqlx::query_as(&sql)
        .fetch_all(pool)
        .await
        .map_err(crate::error::BusError::from)?;
    Ok(rows.into_iter().map(|(v,)| v).collect())
}

pub async fn list_filter_values(pool: &PgPool) -> BusResult<FilterValues> {
    Ok(FilterValues {
        event_types: distinct_non_empty(pool, "event_type").await?,
        actions: distinct_non_empty(pool, "action").await?,
        results: distinct_non_empty(pool, "result").await?,
        actors: distinct_non_empty(pool, "actor").await?,
    })
}
