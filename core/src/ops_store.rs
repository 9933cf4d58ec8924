//! Agent-ops store (spec §4.E): interactions, prompt templates, and
//! command-card *definitions* (the executor in [`crate::executor`] owns
//! runs). Grounded in `original_source/agent_ops_store.py`.
//!
//! Version archiving is applied consistently to both `save_prompt_template`
//! and `save_command_card` — the source shows an explicit archive step only
//! for prompt templates, but spec.md §3 states the invariant for both, and
//! SPEC_FULL.md resolves the discrepancy in favor of the explicit invariant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use crate::audit::{append_event, AppendEvent};
use crate::common::{clamp_limit, escape_like, validate_key};
use crate::error::{BusError, BusResult};

fn normalize_status(status: &str) -> String {
    let text = status.trim().to_lowercase();
    if text.is_empty() {
        "pending".to_string()
    } else {
        text
    }
}

// ---------------------------------------------------------------- interactions

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Interaction {
    pub id: i64,
    pub thread_id: String,
    pub parent_id: Option<i64>,
    pub sender: String,
    pub receiver: String,
    pub msg_type: String,
    pub status: String,
    pub requires_review: bool,
    pub reviewed_by: String,
    pub review_note: String,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const INTERACTION_COLUMNS: &str = "id, thread_id, parent_id, sender, receiver, msg_type, status, \
    requires_review, reviewed_by, review_note, reviewed_at, payload, created_at, updated_at";

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CreateInteraction {
    pub sender: String,
    pub receiver: String,
    pub msg_type: String,
    pub content: String,
    pub thread_id: String,
    pub parent_id: Option<i64>,
    pub requires_review: bool,
    pub metadata: Option<Value>,
    pub status: String,
}

pub async fn create_interaction(pool: &PgPool, input: CreateInteraction) -> BusResult<Interaction> {
    validate_key("sender", &input.sender)?;
    validate_key("msg_type", &input.msg_type)?;
    let status = normalize_status(&input.status);
    let payload = serde_json::json!({
        "content": input.content,
        "metadata": input.metadata.unwrap_or_else(|| Value::Object(Default::default())),
    });

    let sql = format!(
        "INSERT INTO agent_interactions (thread_id, parent_id, sender, receiver, msg_type, status, requires_review, payload, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
         RETURNING {INTERACTION_COLUMNS}"
    );
    let row: Option<Interaction> = sqlx::query_as(&sql)
        .bind(input.thread_id.trim())
        .bind(input.parent_id)
        .bind(&input.sender)
        .bind(input.receiver.trim())
        .bind(&input.msg_type)
        .bind(&status)
        .bind(input.requires_review)
        .bind(&payload)
        .fetch_optional(pool)
        .await?;

    let result = store::require_row(row, "create_interaction")?;

    append_event(
        pool,
        AppendEvent {
            event_type: "agent_interaction".to_string(),
            action: "create".to_string(),
            result: "ok".to_string(),
            actor: input.sender,
            target: input.receiver,
            detail: format!("msg_type={}", input.msg_type),
            level: "INFO".to_string(),
            extra: Some(serde_json::json!({"interaction_id": result.id, "thread_id": result.thread_id})),
        },
    )
    .await?;

    Ok(result)
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListInteractions {
    pub thread_id: String,
    pub sender: String,
    pub receiver: String,
    pub msg_type: String,
    pub status: String,
    pub requires_review: Option<bool>,
    pub limit: Option<i64>,
}

pub async fn list_interactions(pool: &PgPool, q: ListInteractions) -> BusResult<Vec<Interaction>> {
    let mut where_clauses: Vec<String> = Vec::new();
    let mut i = 0;
    let mut bump = || {
        i += 1;
        i
    };

    if !q.thread_id.is_empty() {
        where_clauses.push(format!("thread_id = ${}", bump()));
    }
    if !q.sender.is_empty() {
        where_clauses.push(format!("sender = ${}", bump()));
    }
    if !q.receiver.is_empty() {
        where_clauses.push(format!("receiver = ${}", bump()));
    }
    if !q.msg_type.is_empty() {
        where_clauses.push(format!("msg_type = ${}", bump()));
    }
    if !q.status.is_empty() {
        where_clauses.push(format!("status = ${}", bump()));
    }
    if q.requires_review.is_some() {
        where_clauses.push(format!("requires_review = ${}", bump()));
    }

    let mut sql = format!("SELECT {INTERACTION_COLUMNS} FROM agent_interactions");
    if !where_clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clauses.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY created_at DESC, id DESC LIMIT ${}", i + 1));

    let mut query = sqlx::query_as::<_, Interaction>(&sql);
    if !q.thread_id.is_empty() {
        query = query.bind(q.thread_id.clone());
    }
    if !q.sender.is_empty() {
        query = query.bind(q.sender.clone());
    }
    if !q.receiver.is_empty() {
        query = query.bind(q.receiver.clone());
    }
    if !q.msg_type.is_empty() {
        query = query.bind(q.msg_type.clone());
    }
    if !q.status.is_empty() {
        query = query.bind(normalize_status(&q.status));
    }
    if let Some(rr) = q.requires_review {
        query = query.bind(rr);
    }
    query = query.bind(clamp_limit(q.limit));

    Ok(query.fetch_all(pool).await?)
}

pub async fn review_interaction(
    pool: &PgPool,
    interaction_id: i64,
    status: &str,
    reviewer: &str,
    note: &str,
) -> BusResult<Interaction> {
    let status_text = normalize_status(status);
    let sql = format!(
        "UPDATE agent_interactions SET status = $1, reviewed_by = $2, review_note = $3, reviewed_at = NOW(), updated_at = NOW()
         WHERE id = $4 RETURNING {INTERACTION_COLUMNS}"
    );
    let row: Option<Interaction> = sqlx::query_as(&sql)
        .bind(&status_text)
        .bind(reviewer.trim())
        .bind(note.trim())
        .bind(interaction_id)
        .fetch_optional(pool)
        .await?;

    let result = row.ok_or_else(|| BusError::NotFound(format!("interaction not found: {interaction_id}")))?;

    append_event(
        pool,
        AppendEvent {
            event_type: "agent_interaction".to_string(),
            action: "review".to_string(),
            result: "ok".to_string(),
            actor: reviewer.to_string(),
            target: interaction_id.to_string(),
            detail: status_text,
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(result)
}

// ------------------------------------------------------------ prompt templates

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PromptTemplate {
    pub id: i64,
    pub prompt_key: String,
    pub title: String,
    pub agent_key: String,
    pub tool_name: String,
    pub prompt_text: String,
    pub variables: Value,
    pub tags: Value,
    pub enabled: bool,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PromptTemplateVersion {
    pub id: i64,
    pub prompt_key: String,
    pub title: String,
    pub agent_key: String,
    pub tool_name: String,
    pub prompt_text: String,
    pub variables: Value,
    pub tags: Value,
    pub enabled: bool,
    pub created_by: String,
    pub updated_by: String,
    pub source_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

const PROMPT_COLUMNS: &str = "id, prompt_key, title, agent_key, tool_name, prompt_text, variables, tags, \
    enabled, created_by, updated_by, created_at, updated_at";
const PROMPT_VERSION_COLUMNS: &str = "id, prompt_key, title, agent_key, tool_name, prompt_text, variables, \
    tags, enabled, created_by, updated_by, source_updated_at, created_at, archived_at";

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SavePromptTemplate {
    pub prompt_key: String,
    pub title: String,
    pub prompt_text: String,
    pub agent_key: String,
    pub tool_name: String,
    pub variables: Option<Value>,
    pub tags: Option<Value>,
    pub enabled: bool,
    pub updated_by: String,
}

pub async fn save_prompt_template(pool: &PgPool, input: SavePromptTemplate) -> BusResult<PromptTemplate> {
    validate_key("prompt_key", &input.prompt_key)?;
    let body = input.prompt_text.trim();
    if body.is_empty() {
        return Err(BusError::Validation("prompt_text must not be empty".to_string()));
    }

    let previous: Option<PromptTemplate> = sqlx::query_as(&format!(
        "SELECT {PROMPT_COLUMNS} FROM prompt_templates WHERE prompt_key = $1"
    ))
    .bind(&input.prompt_key)
    .fetch_optional(pool)
    .await?;

    if let Some(prev) = &previous {
        sqlx::query(
            "INSERT INTO prompt_template_versions (prompt_key, title, agent_key, tool_name, prompt_text, variables, tags, enabled, created_by, updated_by, source_updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&prev.prompt_key)
        .bind(&prev.title)
        .bind(&prev.agent_key)
        .bind(&prev.tool_name)
        .bind(&prev.prompt_text)
        .bind(&prev.variables)
        .bind(&prev.tags)
        .bind(prev.enabled)
        .bind(&prev.created_by)
        .bind(&prev.updated_by)
        .bind(prev.updated_at)
        .execute(pool)
        .await?;
    }

    let variables = input.variables.unwrap_or_else(|| Value::Object(Default::default()));
    let tags = input.tags.unwrap_or_else(|| Value::Array(Vec::new()));

    let row: Option<PromptTemplate> = sqlx::query_as(&format!(
        "INSERT INTO prompt_templates (prompt_key, title, agent_key, tool_name, prompt_text, variables, tags, enabled, created_by, updated_by, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, NOW())
         ON CONFLICT (prompt_key) DO UPDATE SET
             title = EXCLUDED.title, agent_key = EXCLUDED.agent_key, tool_name = EXCLUDED.tool_name,
             prompt_text = EXCLUDED.prompt_text, variables = EXCLUDED.variables, tags = EXCLUDED.tags,
             enabled = EXCLUDED.enabled, updated_by = EXCLUDED.updated_by, updated_at = NOW()
         RETURNING {PROMPT_COLUMNS}"
    ))
    .bind(&input.prompt_key)
    .bind(input.title.trim())
    .bind(input.agent_key.trim())
    .bind(input.tool_name.trim())
    .bind(body)
    .bind(&variables)
    .bind(&tags)
    .bind(input.enabled)
    .bind(input.updated_by.trim())
    .fetch_optional(pool)
    .await?;

    let result = store::require_row(row, "save_prompt_template")?;

    append_event(
        pool,
        AppendEvent {
            event_type: "prompt_template".to_string(),
            action: "save".to_string(),
            result: "ok".to_string(),
            actor: input.updated_by,
            target: result.prompt_key.clone(),
            detail: result.tool_name.clone(),
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(result)
}

pub async fn get_prompt_template(pool: &PgPool, prompt_key: &str) -> BusResult<Option<PromptTemplate>> {
    validate_key("prompt_key", prompt_key)?;
    Ok(
        sqlx::query_as(&format!("SELECT {PROMPT_COLUMNS} FROM prompt_templates WHERE prompt_key = $1"))
            .bind(prompt_key)
            .fetch_optional(pool)
            .await?,
    )
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListPromptTemplates {
    pub agent_key: String,
    pub tool_name: String,
    pub keyword: String,
    pub enabled_only: bool,
    pub limit: Option<i64>,
}

pub async fn list_prompt_templates(pool: &PgPool, q: ListPromptTemplates) -> BusResult<Vec<PromptTemplate>> {
    let mut where_clauses: Vec<String> = Vec::new();
    let mut i = 0;
    if !q.agent_key.is_empty() {
        i += 1;
        where_clauses.push(format!("agent_key = ${i}"));
    }
    if !q.tool_name.is_empty() {
        i += 1;
        where_clauses.push(format!("tool_name = ${i}"));
    }
    if q.enabled_only {
        where_clauses.push("enabled = TRUE".to_string());
    }
    let keyword_idx;
    if !q.keyword.is_empty() {
        i += 1;
        keyword_idx = i;
        where_clauses.push(format!(
            "(LOWER(prompt_key) LIKE ${keyword_idx} ESCAPE '\\' OR LOWER(title) LIKE ${keyword_idx} ESCAPE '\\' OR LOWER(prompt_text) LIKE ${keyword_idx} ESCAPE '\\')"
        ));
    } else {
        keyword_idx = 0;
    }

    let mut sql = format!("SELECT {PROMPT_COLUMNS} FROM prompt_templates");
    if !where_clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clauses.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY updated_at DESC, id DESC LIMIT ${}", i + 1));

    let mut query = sqlx::query_as::<_, PromptTemplate>(&sql);
    if !q.agent_key.is_empty() {
        query = query.bind(q.agent_key.clone());
    }
    if !q.tool_name.is_empty() {
        query = query.bind(q.tool_name.clone());
    }
    if keyword_idx > 0 {
        query = query.bind(escape_like(&q.keyword.to_lowercase()));
    }
    query = query.bind(clamp_limit(q.limit));

    Ok(query.fetch_all(pool).await?)
}

pub async fn set_prompt_template_enabled(
    pool: &PgPool,
    prompt_key: &str,
    enabled: bool,
    updated_by: &str,
) -> BusResult<PromptTemplate> {
    validate_key("prompt_key", prompt_key)?;
    let row: Option<PromptTemplate> = sqlx::query_as(&format!(
        "UPDATE prompt_templates SET enabled = $1, updated_by = $2, updated_at = NOW() WHERE prompt_key = $3 RETURNING {PROMPT_COLUMNS}"
    ))
    .bind(enabled)
    .bind(updated_by.trim())
    .bind(prompt_key)
    .fetch_optional(pool)
    .await?;

    let result = row.ok_or_else(|| BusError::NotFound(format!("prompt not found: {prompt_key}")))?;

    append_event(
        pool,
        AppendEvent {
            event_type: "prompt_template".to_string(),
            action: "toggle".to_string(),
            result: "ok".to_string(),
            actor: updated_by.to_string(),
            target: prompt_key.to_string(),
            detail: if enabled { "enabled".to_string() } else { "disabled".to_string() },
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(result)
}

pub async fn list_prompt_template_versions(
    pool: &PgPool,
    prompt_key: &str,
    limit: Option<i64>,
) -> BusResult<Vec<PromptTemplateVersion>> {
    validate_key("prompt_key", prompt_key)?;
    let max_items = config::normalize_limit(limit, 20, 1000);
    Ok(sqlx::query_as(&format!(
        "SELECT {PROMPT_VERSION_COLUMNS} FROM prompt_template_versions WHERE prompt_key = $1 ORDER BY id DESC LIMIT $2"
    ))
    .bind(prompt_key)
    .bind(max_items)
    .fetch_all(pool)
    .await?)
}

pub async fn rollback_prompt_template(
    pool: &PgPool,
    prompt_key: &str,
    version_id: i64,
    updated_by: &str,
) -> BusResult<(PromptTemplate, PromptTemplateVersion)> {
    validate_key("prompt_key", prompt_key)?;
    if version_id <= 0 {
        return Err(BusError::Validation("version_id must be positive".to_string()));
    }

    let version: Option<PromptTemplateVersion> = sqlx::query_as(&format!(
        "SELECT {PROMPT_VERSION_COLUMNS} FROM prompt_template_versions WHERE id = $1 AND prompt_key = $2"
    ))
    .bind(version_id)
    .bind(prompt_key)
    .fetch_optional(pool)
    .await?;

    let version = version
        .ok_or_else(|| BusError::NotFound(format!("prompt version not found: {prompt_key}#{version_id}")))?;

    let prompt = save_prompt_template(
        pool,
        SavePromptTemplate {
            prompt_key: prompt_key.to_string(),
            title: version.title.clone(),
            prompt_text: version.prompt_text.clone(),
            agent_key: version.agent_key.clone(),
            tool_name: version.tool_name.clone(),
            variables: Some(version.variables.clone()),
            tags: Some(version.tags.clone()),
            enabled: version.enabled,
            updated_by: updated_by.to_string(),
        },
    )
    .await?;

    append_event(
        pool,
        AppendEvent {
            event_type: "prompt_template".to_string(),
            action: "rollback".to_string(),
            result: "ok".to_string(),
            actor: updated_by.to_string(),
            target: prompt_key.to_string(),
            detail: format!("version_id={version_id}"),
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok((prompt, version))
}

// -------------------------------------------------------------- command cards

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CommandCard {
    pub id: i64,
    pub card_key: String,
    pub title: String,
    pub description: String,
    pub command_template: String,
    pub args_schema: Value,
    pub risk_level: String,
    pub enabled: bool,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CommandCardVersion {
    pub id: i64,
    pub card_key: String,
    pub title: String,
    pub description: String,
    pub command_template: String,
    pub args_schema: Value,
    pub risk_level: String,
    pub enabled: bool,
    pub created_by: String,
    pub updated_by: String,
    pub source_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

const CARD_COLUMNS: &str = "id, card_key, title, description, command_template, args_schema, risk_level, \
    enabled, created_by, updated_by, created_at, updated_at";
const CARD_VERSION_COLUMNS: &str = "id, card_key, title, description, command_template, args_schema, \
    risk_level, enabled, created_by, updated_by, source_updated_at, created_at, archived_at";

pub const RISK_LEVELS: &[&str] = &["low", "normal", "high", "critical"];

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SaveCommandCard {
    pub card_key: String,
    pub title: String,
    pub command_template: String,
    pub description: String,
    pub args_schema: Option<Value>,
    pub risk_level: String,
    pub enabled: bool,
    pub updated_by: String,
}

pub async fn save_command_card(pool: &PgPool, input: SaveCommandCard) -> BusResult<CommandCard> {
    validate_key("card_key", &input.card_key)?;
    let title = input.title.trim();
    if title.is_empty() {
        return Err(BusError::Validation("title must not be empty".to_string()));
    }
    let command_template = input.command_template.trim();
    if command_template.is_empty() {
        return Err(BusError::Validation("command_template must not be empty".to_string()));
    }
    let risk_level = {
        let text = input.risk_level.trim().to_lowercase();
        if text.is_empty() { "normal".to_string() } else { text }
    };
    if !RISK_LEVELS.contains(&risk_level.as_str()) {
        return Err(BusError::Validation(format!("invalid risk_level: {risk_level}")));
    }

    let previous: Option<CommandCard> = sqlx::query_as(&format!(
        "SELECT {CARD_COLUMNS} FROM command_cards WHERE card_key = $1"
    ))
    .bind(&input.card_key)
    .fetch_optional(pool)
    .await?;

    if let Some(prev) = &previous {
        sqlx::query(
            "INSERT INTO command_card_versions (card_key, title, description, command_template, args_schema, risk_level, enabled, created_by, updated_by, source_updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&prev.card_key)
        .bind(&prev.title)
        .bind(&prev.description)
        .bind(&prev.command_template)
        .bind(&prev.args_schema)
        .bind(&prev.risk_level)
        .bind(prev.enabled)
        .bind(&prev.created_by)
        .bind(&prev.updated_by)
        .bind(prev.updated_at)
        .execute(pool)
        .await?;
    }

    let args_schema = input.args_schema.unwrap_or_else(|| Value::Object(Default::default()));

    let row: Option<CommandCard> = sqlx::query_as(&format!(
        "INSERT INTO command_cards (card_key, title, description, command_template, args_schema, risk_level, enabled, created_by, updated_by, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, NOW())
         ON CONFLICT (card_key) DO UPDATE SET
             title = EXCLUDED.title, description = EXCLUDED.description, command_template = EXCLUDED.command_template,
             args_schema = EXCLUDED.args_schema, risk_level = EXCLUDED.risk_level, enabled = EXCLUDED.enabled,
             updated_by = EXCLUDED.updated_by, updated_at = NOW()
         RETURNING {CARD_COLUMNS}"
    ))
    .bind(&input.card_key)
    .bind(title)
    .bind(input.description.trim())
    .bind(command_template)
    .bind(&args_schema)
    .bind(&risk_level)
    .bind(input.enabled)
    .bind(input.updated_by.trim())
    .fetch_optional(pool)
    .await?;

    let result = store::require_row(row, "save_command_card")?;

    append_event(
        pool,
        AppendEvent {
            event_type: "command_card".to_string(),
            action: "save".to_string(),
            result: "ok".to_string(),
            actor: input.updated_by,
            target: result.card_key.clone(),
            detail: result.risk_level.clone(),
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(result)
}

pub async fn get_command_card(pool: &PgPool, card_key: &str) -> BusResult<Option<CommandCard>> {
    validate_key("card_key", card_key)?;
    Ok(
        sqlx::query_as(&format!("SELECT {CARD_COLUMNS} FROM command_cards WHERE card_key = $1"))
            .bind(card_key)
            .fetch_optional(pool)
            .await?,
    )
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListCommandCards {
    pub keyword: String,
    pub risk_level: String,
    pub enabled_only: bool,
    pub limit: Option<i64>,
}

pub async fn list_command_cards(pool: &PgPool, q: ListCommandCards) -> BusResult<Vec<CommandCard>> {
    let mut where_clauses: Vec<String> = Vec::new();
    let mut i = 0;
    if !q.risk_level.is_empty() {
        i += 1;
        where_clauses.push(format!("risk_level = ${i}"));
    }
    if q.enabled_only {
        where_clauses.push("enabled = TRUE".to_string());
    }
    let keyword_idx;
    if !q.keyword.is_empty() {
        i += 1;
        keyword_idx = i;
        where_clauses.push(format!(
            "(LOWER(card_key) LIKE ${keyword_idx} ESCAPE '\\' OR LOWER(title) LIKE ${keyword_idx} ESCAPE '\\' OR LOWER(description) LIKE ${keyword_idx} ESCAPE '\\' OR LOWER(command_template) LIKE ${keyword_idx} ESCAPE '\\')"
        ));
    } else {
        keyword_idx = 0;
    }

    let mut sql = format!("SELECT {CARD_COLUMNS} FROM command_cards");
    if !where_clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clauses.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY updated_at DESC, id DESC LIMIT ${}", i + 1));

    let mut query = sqlx::query_as::<_, CommandCard>(&sql);
    if !q.risk_level.is_empty() {
        query = query.bind(q.risk_level.to_lowercase());
    }
    if keyword_idx > 0 {
        query = query.bind(escape_like(&q.keyword.to_lowercase()));
    }
    query = query.bind(clamp_limit(q.limit));

    Ok(query.fetch_all(pool).await?)
}

pub async fn set_command_card_enabled(
    pool: &PgPool,
    card_key: &str,
    enabled: bool,
    updated_by: &str,
) -> BusResult<CommandCard> {
    validate_key("card_key", card_key)?;
    let row: Option<CommandCard> = sqlx::query_as(&format!(
        "UPDATE command_cards SET enabled = $1, updated_by = $2, updated_at = NOW() WHERE card_key = $3 RETURNING {CARD_COLUMNS}"
    ))
    .bind(enabled)
    .bind(updated_by.trim())
    .bind(card_key)
    .fetch_optional(pool)
    .await?;

    let result = row.ok_or_else(|| BusError::NotFound(format!("command card not found: {card_key}")))?;

    append_event(
        pool,
        AppendEvent {
            event_type: "command_card".to_string(),
            action: "toggle".to_string(),
            result: "ok".to_string(),
            actor: updated_by.to_string(),
            target: card_key.to_string(),
            detail: if enabled { "enabled".to_string() } else { "disabled".to_string() },
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(result)
}

pub async fn list_command_card_versions(
    pool: &PgPool,
    card_key: &str,
    limit: Option<i64>,
) -> BusResult<Vec<CommandCardVersion>> {
    validate_key("card_key", card_key)?;
    let max_items = config::normalize_limit(limit, 20, 1000);
    Ok(sqlx::query_as(&format!(
        "SELECT {CARD_VERSION_COLUMNS} FROM command_card_versions WHERE card_key = $1 ORDER BY id DESC LIMIT $2"
    ))
    .bind(card_key)
    .bind(max_items)
    .fetch_all(pool)
    .await?)
}

pub async fn rollback_command_card(
    pool: &PgPool,
    card_key: &str,
    version_id: i64,
    updated_by: &str,
) -> BusResult<(CommandCard, CommandCardVersion)> {
    validate_key("card_key", card_key)?;
    if version_id <= 0 {
        return Err(BusError::Validation("version_id must be positive".to_string()));
    }

    let version: Option<CommandCardVersion> = sqlx::query_as(&format!(
        "SELECT {CARD_VERSION_COLUMNS} FROM command_card_versions WHERE id = $1 AND card_key = $2"
    ))
    .bind(version_id)
    .bind(card_key)
    .fetch_optional(pool)
    .await?;

    let version =
        version.ok_or_else(|| BusError::NotFound(format!("command card version not found: {card_key}#{version_id}")))?;

    let card = save_command_card(
        pool,
        SaveCommandCard {
            card_key: card_key.to_string(),
            title: version.title.clone(),
            command_template: version.command_template.clone(),
            description: version.description.clone(),
            args_schema: Some(version.args_schema.clone()),
            risk_level: version.risk_level.clone(),
            enabled: version.enabled,
            updated_by: updated_by.to_string(),
        },
    )
    .await?;

    append_event(
        pool,
        AppendEvent {
            event_type: "command_card".to_string(),
            action: "rollback".to_string(),
            result: "ok".to_string(),
            actor: updated_by.to_string(),
            target: card_key.to_string(),
            detail: format!("version_id={version_id}"),
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok((card, version))
}
