//! System log store and its AI-log derived view (spec §6: `/api/system-log`,
//! `/api/ai-log` and their `/export` variants).
//!
//! Grounded in `original_source/归档/system_log.py` (`append_log`,
//! `query_logs`, `list_filter_values`) and `归档/ai_log.py` (`query_ai_logs`,
//! classification by logger prefix / message hint). The original's regex
//! extraction of HTTP method/endpoint/status from the raw log line is not
//! reproduced — the table already carries `level`/`logger`/`message`, which
//! is enough to filter and classify; callers needing the raw HTTP detail
//! still have it in `raw`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::common::{clamp_limit, escape_like};
use crate::error::BusResult;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SystemLogEntry {
    pub ts: DateTime<Utc>,
    pub level: String,
    pub logger: String,
    pub message: String,
    pub raw: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AiLogEntry {
    #[serde(flatten)]
    pub entry: SystemLogEntry,
    pub category: String,
}

#[derive(Debug, Default, Clone)]
pub struct AppendSystemLog {
    pub level: String,
    pub logger: String,
    pub message: String,
    pub raw: String,
}

pub async fn append_log(pool: &PgPool, input: AppendSystemLog) -> BusResult<SystemLogEntry> {
    let level = if input.level.trim().is_empty() { "INFO".to_string() } else { input.level.trim().to_uppercase() };
    let logger = input.logger.trim().to_string();
    let ts = Utc::now();

    sqlx::query("INSERT INTO system_logs (ts, level, logger, message, raw) VALUES ($1, $2, $3, $4, $5)")
        .bind(ts)
        .bind(&level)
        .bind(&logger)
        .bind(&input.message)
        .bind(&input.raw)
        .execute(pool)
        .await
        .map_err(crate::error::BusError::from)?;

    Ok(SystemLogEntry { ts, level, logger, message: input.message, raw: input.raw })
}

#[derive(Debug, Default, Clone)]
pub struct QuerySystemLog {
    pub limit: Option<i64>,
    pub level: String,
    pub logger: String,
    pub keyword: String,
}

pub async fn query_system_logs(pool: &PgPool, q: QuerySystemLog) -> BusResult<Vec<SystemLogEntry>> {
    let max_items = clamp_limit(q.limit);
    let mut where_clauses: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    if !q.level.is_empty() {
        where_clauses.push(format!("level = ${}", binds.len() + 1));
        binds.push(q.level.clone());
    }
    if !q.logger.is_empty() {
        where_clauses.push(format!("logger = ${}", binds.len() + 1));
        binds.push(q.logger.clone());
    }
    let keyword_idx;
    if !q.keyword.is_empty() {
        let kw = format!("%{}%", escape_like(&q.keyword.to_lowercase()));
        keyword_idx = binds.len() + 1;
        binds.push(kw);
        where_clauses.push(format!(
            "(LOWER(level) LIKE ${i} ESCAPE '\\' OR LOWER(logger) LIKE ${i} ESCAPE '\\' \
             OR LOWER(message) LIKE ${i} ESCAPE '\\' OR LOWER(raw) LIKE ${i} ESCAPE '\\')",
            i = keyword_idx
        ));
    }

    let mut sql = String::from("SELECT ts, level, logger, message, raw FROM system_logs");
    if !where_clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clauses.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY ts DESC, id DESC LIMIT ${}", binds.len() + 1));

    let mut query = sqlx::query_as::<_, SystemLogEntry>(&sql);
    for b in &binds {
        query = query.bind(b);
    }
    query = query.bind(max_items);

    query.fetch_all(pool).await.map_err(crate::error::BusError::from)
}

#[derive(Debug, Default, Serialize)]
pub struct LogFilterValues {
    pub levels: Vec<String>,
    pub loggers: Vec<String>,
}

pub async fn list_filter_values(pool: &PgPool) -> BusResult<LogFilterValues> {
    let levels: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT level FROM system_logs WHERE level <> '' ORDER BY level")
            .fetch_all(pool)
            .await
            .map_err(crate::error::BusError::from)?;
    let loggers: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT logger FROM system_logs WHERE logger <> '' ORDER BY logger")
            .fetch_all(pool)
            .await
            .map_err(crate::error::BusError::from)?;
    Ok(LogFilterValues {
        levels: levels.into_iter().map(|(v,)| v).collect(),
        loggers: loggers.into_iter().map(|(v,)| v).collect(),
    })
}

const AI_LOGGER_PREFIXES: &[&str] = &["httpx", "openai", "langchain_openai"];
const AI_HINTS: &[&str] = &[
    "/responses",
    "/chat/completions",
    "openai",
    "error code:",
    "gpt-",
    "reasoning",
    "previous_response_id",
    "responses store",
    "conversation",
];

fn is_ai_row(entry: &SystemLogEntry) -> bool {
    let logger = entry.logger.to_lowercase();
    if AI_LOGGER_PREFIXES.iter().any(|p| logger.starts_with(p)) {
        return true;
    }
    let text = entry.message.to_lowercase();
    AI_HINTS.iter().any(|h| text.contains(h))
}

fn classify(entry: &SystemLogEntry) -> String {
    let text = entry.message.to_lowercase();
    if text.contains("error code:") || text.contains("invalid_request_error") {
        "api_error".to_string()
    } else if text.contains("use_previous_response_id") || text.contains("responses store") {
        "compat_fallback".to_string()
    } else if entry.logger == "utils" && text.contains("model=") {
        "runtime_config".to_string()
    } else if entry.level == "ERROR" {
        "error".to_string()
    } else {
        "ai_event".to_string()
    }
}

pub async fn query_ai_logs(pool: &PgPool, mut q: QuerySystemLog) -> BusResult<Vec<AiLogEntry>> {
    // AI log queries scan a wider window than requested, since most rows in
    // `system_logs` are filtered out by `is_ai_row` before the limit applies.
    let requested_limit = clamp_limit(q.limit);
    q.limit = Some((requested_limit * 5).min(2000));
    let rows = query_system_logs(pool, q).await?;
    Ok(rows
        .into_iter()
        .filter(is_ai_row)
        .take(requested_limit as usize)
        .map(|entry| {
            let category = classify(&entry);
            AiLogEntry { entry, category }
        })
        .collect())
}

pub async fn list_ai_filter_values(pool: &PgPool) -> BusResult<LogFilterValues> {
    list_filter_values(pool).await
}
