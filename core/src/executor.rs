//! Command-card executor (spec §4.F): template rendering, review gate,
//! subprocess execution, crash recovery. Grounded in
//! `original_source/command_card_executor.py`.
//!
//! Commands are tokenized with [`shell_words`] and run via [`tokio::process`]
//! directly (no shell), mirroring the source's `shlex.split` + `subprocess.run`
//! without `shell=True`.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::audit::{append_event, AppendEvent};
use crate::common::clamp_limit;
use crate::error::{BusError, BusResult};
use crate::ops_store::{self, CreateInteraction};

pub const APPROVAL_REQUIRED_RISKS: &[&str] = &["high", "critical"];
pub const AUTO_APPROVE_ALLOWED_RISKS: &[&str] = &["low", "normal"];
pub const DEFAULT_TIMEOUT_SEC: i64 = 120;
pub const MIN_TIMEOUT_SEC: i64 = 1;
pub const MAX_TIMEOUT_SEC: i64 = 3600;
pub const DEFAULT_OUTPUT_LIMIT: usize = 20_000;
pub const MIN_OUTPUT_LIMIT: usize = 200;
pub const MAX_OUTPUT_LIMIT: usize = 200_000;

static DANGEROUS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(?:^|[;&|()\s])rm\s+-rf(?:\s|$)").unwrap(),
        Regex::new(r"(?i)(?:^|[;&|()\s])shutdown(?:\s|$)").unwrap(),
        Regex::new(r"(?i)(?:^|[;&|()\s])reboot(?:\s|$)").unwrap(),
        Regex::new(r"(?i)curl[^\n|]*\|\s*(?:bash|sh)(?:\s|$)").unwrap(),
        Regex::new(r"(?i)wget[^\n|]*\|\s*(?:bash|sh)(?:\s|$)").unwrap(),
    ]
});

fn detect_dangerous_pattern(command: &str) -> String {
    let text = command.trim();
    if text.is_empty() {
        return String::new();
    }
    for pattern in DANGEROUS_PATTERNS.iter() {
        if pattern.is_match(text) {
            return pattern.as_str().to_string();
        }
    }
    String::new()
}

fn normalize_timeout(timeout_sec: Option<i64>) -> i64 {
    let raw = timeout_sec.unwrap_or_else(|| {
        config::as_int_env(
            "COMMAND_CARD_TIMEOUT_SEC",
            DEFAULT_TIMEOUT_SEC,
            i64::MIN,
            i64::MAX,
        )
    });
    raw.clamp(MIN_TIMEOUT_SEC, MAX_TIMEOUT_SEC)
}

fn normalize_output_limit() -> usize {
    let raw = config::as_int_env(
        "COMMAND_CARD_OUTPUT_LIMIT",
        DEFAULT_OUTPUT_LIMIT as i64,
        MIN_OUTPUT_LIMIT as i64,
        MAX_OUTPUT_LIMIT as i64,
    );
    raw as usize
}

fn tail_bytes(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let start = text.len() - limit;
    let mut boundary = start;
    while boundary < text.len() && !text.is_char_boundary(boundary) {
        boundary += 1;
    }
    text[boundary..].to_string()
}

fn validate_params(schema: &Value, params: &Value) -> Result<(), BusError> {
    let Value::Object(schema_obj) = schema else { return Ok(()) };
    if schema_obj.is_empty() {
        return Ok(());
    }
    let params_obj = match params {
        Value::Object(obj) => obj.clone(),
        _ => Default::default(),
    };

    let mut required: Vec<String> = Vec::new();
    let mut expected_type: HashMap<String, String> = HashMap::new();

    if let Some(Value::Object(properties)) = schema_obj.get("properties") {
        if let Some(Value::Array(req)) = schema_obj.get("required") {
            for item in req {
                if let Some(s) = item.as_str() {
                    if !s.is_empty() {
                        required.push(s.to_string());
                    }
                }
            }
        }
        for (key, value) in properties {
            if let Value::Object(v) = value {
                if let Some(t) = v.get("type").and_then(Value::as_str) {
                    if !t.is_empty() {
                        expected_type.insert(key.clone(), t.to_lowercase());
                    }
                }
            } else if let Some(t) = value.as_str() {
                expected_type.insert(key.clone(), t.to_lowercase());
            }
        }
    } else {
        for (key, value) in schema_obj {
            match value {
                Value::Object(v) => {
                    let is_required = v.get("required").and_then(Value::as_bool).unwrap_or(true);
                    if is_required {
                        required.push(key.clone());
                    }
                    if let Some(t) = v.get("type").and_then(Value::as_str) {
                        if !t.is_empty() {
                            expected_type.insert(key.clone(), t.to_lowercase());
                        }
                    }
                }
                Value::String(t) => {
                    required.push(key.clone());
                    if !t.trim().is_empty() {
                        expected_type.insert(key.clone(), t.trim().to_lowercase());
                    }
                }
                _ => required.push(key.clone()),
            }
        }
    }

    let mut missing: Vec<&String> = required.iter().filter(|name| !params_obj.contains_key(*name)).collect();
    if !missing.is_empty() {
        missing.sort();
        let names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
        return Err(BusError::Validation(format!("missing parameters: {}", names.join(", "))));
    }

    for (key, type_name) in &expected_type {
        let Some(value) = params_obj.get(key) else { continue };
        let ok = match type_name.as_str() {
            "int" | "integer" => value.is_i64() || value.is_u64(),
            "float" | "number" => value.is_number(),
            "bool" | "boolean" => value.is_boolean(),
            "str" | "string" => value.is_string(),
            _ => true,
        };
        if !ok {
            return Err(BusError::Validation(format!("parameter {key} requires {type_name}")));
        }
    }

    Ok(())
}

fn shell_quote_value(value: &Value) -> String {
    let normalized = match value {
        Value::Null => String::new(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    shell_words::quote(&normalized).into_owned()
}

fn render_template(template: &str, params: &Value) -> Result<String, BusError> {
    let params_obj = match params {
        Value::Object(obj) => obj.clone(),
        _ => Default::default(),
    };

    let mut rendered = String::with_capacity(template.len());
    let mut i = 0;
    while i < template.len() {
        let ch = template[i..].chars().next().unwrap();
        if ch == '{' {
            if let Some(end) = template[i + 1..].find('}') {
                let name = &template[i + 1..i + 1 + end];
                let value = params_obj
                    .get(name)
                    .ok_or_else(|| BusError::Validation(format!("command template missing parameter: {name}")))?;
                rendered.push_str(&shell_quote_value(value));
                i = i + 1 + end + 1;
                continue;
            }
        }
        rendered.push(ch);
        i += ch.len_utf8();
    }
    Ok(rendered)
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CommandCardRun {
    pub id: i64,
    pub card_key: String,
    pub requested_by: String,
    pub params: Value,
    pub rendered_command: String,
    pub risk_level: String,
    pub status: String,
    pub requires_review: bool,
    pub interaction_id: Option<i64>,
    pub output: String,
    pub error: String,
    pub exit_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl CommandCardRun {
    pub fn execution_mode(&self) -> &'static str {
        if self.requires_review {
            "reviewed"
        } else {
            "direct"
        }
    }
}

const RUN_COLUMNS: &str = "id, card_key, requested_by, params, rendered_command, risk_level, status, \
    requires_review, interaction_id, output, error, exit_code, created_at, updated_at, executed_at";

async fn get_run(pool: &PgPool, run_id: i64) -> BusResult<Option<CommandCardRun>> {
    Ok(
        sqlx::query_as(&format!("SELECT {RUN_COLUMNS} FROM command_card_runs WHERE id = $1"))
            .bind(run_id)
            .fetch_optional(pool)
            .await?,
    )
}

#[derive(Debug, Clone)]
pub struct PrepareOutcome {
    pub needs_review: bool,
    pub dangerous_command: bool,
    pub dangerous_pattern: String,
    pub run: CommandCardRun,
    pub interaction: Option<ops_store::Interaction>,
}

pub async fn prepare_command_card_run(
    pool: &PgPool,
    card_key: &str,
    params: Value,
    requested_by: &str,
    require_review: Option<bool>,
) -> BusResult<PrepareOutcome> {
    let key = card_key.trim();
    if key.is_empty() {
        return Err(BusError::Validation("card_key must not be empty".to_string()));
    }

    let card = ops_store::get_command_card(pool, key)
        .await?
        .ok_or_else(|| BusError::NotFound(format!("command card not found: {key}")))?;
    if !card.enabled {
        return Err(BusError::GuardedDenied(format!("command card disabled: {key}")));
    }

    validate_params(&card.args_schema, &params)?;
    let rendered = render_template(&card.command_template, &params)?;

    let risk_level = {
        let text = card.risk_level.trim().to_lowercase();
        if text.is_empty() { "normal".to_string() } else { text }
    };
    let dangerous_pattern = detect_dangerous_pattern(&rendered);

    let needs_review = require_review.unwrap_or_else(|| {
        APPROVAL_REQUIRED_RISKS.contains(&risk_level.as_str()) || !dangerous_pattern.is_empty()
    });
    let status = if needs_review { "pending_review" } else { "ready" };

    let row: Option<CommandCardRun> = sqlx::query_as(&format!(
        "INSERT INTO command_card_runs (card_key, requested_by, params, rendered_command, risk_level, status, requires_review, interaction_id, output, error, exit_code, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, '', '', NULL, NOW(), NOW())
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(key)
    .bind(requested_by)
    .bind(&params)
    .bind(&rendered)
    .bind(&risk_level)
    .bind(status)
    .bind(needs_review)
    .fetch_optional(pool)
    .await?;

    let mut run = store::require_row(row, "prepare_command_card_run")?;
    let mut interaction = None;

    if needs_review {
        let created = ops_store::create_interaction(
            pool,
            CreateInteraction {
                sender: requested_by.to_string(),
                receiver: "human_reviewer".to_string(),
                msg_type: "command_card_review".to_string(),
                content: format!("card={key}\ncommand={rendered}\nparams={params}"),
                thread_id: format!("cmdrun:{}", run.id),
                parent_id: None,
                requires_review: true,
                metadata: Some(serde_json::json!({
                    "run_id": run.id,
                    "card_key": key,
                    "risk_level": risk_level,
                    "dangerous_pattern": dangerous_pattern,
                })),
                status: "pending".to_string(),
            },
        )
        .await?;

        sqlx::query("UPDATE command_card_runs SET interaction_id = $1, updated_at = NOW() WHERE id = $2")
            .bind(created.id)
            .bind(run.id)
            .execute(pool)
            .await?;
        run.interaction_id = Some(created.id);
        interaction = Some(created);
    }

    append_event(
        pool,
        AppendEvent {
            event_type: "command_card_run".to_string(),
            action: "prepare".to_string(),
            result: if needs_review { "pending_review".to_string() } else { "ready".to_string() },
            actor: requested_by.to_string(),
            target: key.to_string(),
            detail: format!("run_id={}", run.id),
            level: "INFO".to_string(),
            extra: Some(serde_json::json!({
                "risk_level": risk_level,
                "requires_review": needs_review,
                "dangerous_pattern": dangerous_pattern,
            })),
        },
    )
    .await?;

    Ok(PrepareOutcome {
        needs_review,
        dangerous_command: !dangerous_pattern.is_empty(),
        dangerous_pattern,
        run,
        interaction,
    })
}

pub async fn review_command_card_run(
    pool: &PgPool,
    run_id: i64,
    decision: &str,
    reviewer: &str,
    note: &str,
) -> BusResult<CommandCardRun> {
    let run = get_run(pool, run_id)
        .await?
        .ok_or_else(|| BusError::NotFound(format!("run not found: {run_id}")))?;

    let decision_text = decision.trim().to_lowercase();
    if decision_text != "approved" && decision_text != "rejected" {
        return Err(BusError::Validation("decision must be approved/rejected".to_string()));
    }

    if let Some(interaction_id) = run.interaction_id {
        ops_store::review_interaction(pool, interaction_id, &decision_text, reviewer, note).await?;
    }

    let next_status = if decision_text == "approved" { "ready" } else { "rejected" };
    let row: Option<CommandCardRun> = sqlx::query_as(&format!(
        "UPDATE command_card_runs SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING {RUN_COLUMNS}"
    ))
    .bind(next_status)
    .bind(run_id)
    .fetch_optional(pool)
    .await?;

    let result = row.ok_or_else(|| BusError::NotFound(format!("run update failed: {run_id}")))?;

    append_event(
        pool,
        AppendEvent {
            event_type: "command_card_run".to_string(),
            action: "review".to_string(),
            result: decision_text,
            actor: reviewer.to_string(),
            target: result.card_key.clone(),
            detail: format!("run_id={run_id}"),
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(result)
}

async fn recover_stale_runs(pool: &PgPool, timeout_sec: Option<i64>) -> BusResult<u64> {
    let timeout = normalize_timeout(timeout_sec);
    let stale_threshold_sec = (timeout * 2).max(300);
    let result = sqlx::query(
        "UPDATE command_card_runs
         SET status = 'failed', error = '[timeout_recovery] process crash or timeout', exit_code = -3, updated_at = NOW()
         WHERE status = 'running' AND updated_at < NOW() - (make_interval(secs => $1))",
    )
    .bind(stale_threshold_sec as f64)
    .execute(pool)
    .await?;

    let count = result.rows_affected();
    if count > 0 {
        append_event(
            pool,
            AppendEvent {
                event_type: "command_card_run".to_string(),
                action: "recover_stale".to_string(),
                result: "ok".to_string(),
                actor: "system".to_string(),
                target: "command_card_runs".to_string(),
                detail: format!("recovered {count} stale running task(s)"),
                level: "WARN".to_string(),
                extra: None,
            },
        )
        .await?;
    }
    Ok(count)
}

pub struct ExecutionOutcome {
    pub success: bool,
    pub run: CommandCardRun,
    pub message: Option<String>,
}

pub async fn execute_command_card_run(
    pool: &PgPool,
    run_id: i64,
    actor: &str,
    timeout_sec: Option<i64>,
) -> BusResult<ExecutionOutcome> {
    recover_stale_runs(pool, timeout_sec).await?;

    let run = get_run(pool, run_id)
        .await?
        .ok_or_else(|| BusError::NotFound(format!("run not found: {run_id}")))?;

    match run.status.as_str() {
        "pending_review" => {
            return Ok(ExecutionOutcome {
                success: false,
                message: Some(format!("run still pending review: {run_id}")),
                run,
            })
        }
        "rejected" => {
            return Ok(ExecutionOutcome {
                success: false,
                message: Some(format!("run rejected: {run_id}")),
                run,
            })
        }
        "success" => {
            return Ok(ExecutionOutcome {
                success: true,
                message: Some("already executed successfully, skipping re-run".to_string()),
                run,
            })
        }
        _ => {}
    }

    sqlx::query("UPDATE command_card_runs SET status = 'running', updated_at = NOW() WHERE id = $1")
        .bind(run_id)
        .execute(pool)
        .await?;

    let timeout = normalize_timeout(timeout_sec);
    let output_limit = normalize_output_limit();
    let cmd = run.rendered_command.trim();
    if cmd.is_empty() {
        return Ok(ExecutionOutcome {
            success: false,
            message: Some("empty command cannot be executed".to_string()),
            run,
        });
    }

    let (stdout, stderr, exit_code, final_status) = match shell_words::split(cmd) {
        Err(e) => (
            String::new(),
            format!("[invalid_command] {e}"),
            -2,
            "failed".to_string(),
        ),
        Ok(argv) if argv.is_empty() => (
            String::new(),
            "[invalid_command] empty argv".to_string(),
            -2,
            "failed".to_string(),
        ),
        Ok(argv) => run_subprocess(&argv, timeout, output_limit).await,
    };

    let row: Option<CommandCardRun> = sqlx::query_as(&format!(
        "UPDATE command_card_runs SET status = $1, output = $2, error = $3, exit_code = $4, executed_at = NOW(), updated_at = NOW()
         WHERE id = $5 RETURNING {RUN_COLUMNS}"
    ))
    .bind(&final_status)
    .bind(&stdout)
    .bind(&stderr)
    .bind(exit_code)
    .bind(run_id)
    .fetch_optional(pool)
    .await?;

    let result = row.ok_or_else(|| BusError::NotFound(format!("run update failed: {run_id}")))?;

    append_event(
        pool,
        AppendEvent {
            event_type: "command_card_run".to_string(),
            action: "execute".to_string(),
            result: final_status.clone(),
            actor: actor.to_string(),
            target: result.card_key.clone(),
            detail: format!("run_id={run_id},exit_code={exit_code}"),
            level: if final_status == "success" { "INFO".to_string() } else { "WARN".to_string() },
            extra: None,
        },
    )
    .await?;

    Ok(ExecutionOutcome {
        success: final_status == "success",
        message: None,
        run: result,
    })
}

async fn run_subprocess(argv: &[String], timeout_sec: i64, output_limit: usize) -> (String, String, i32, String) {
    let mut command = Command::new(&argv[0]);
    command.args(&argv[1..]);
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command.stdin(Stdio::null());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return (String::new(), format!("[not_found] {e}"), 127, "failed".to_string())
        }
        Err(e) => return (String::new(), format!("[not_found] {e}"), 127, "failed".to_string()),
    };

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    let read_all = async {
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut out_buf).await;
        }
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut err_buf).await;
        }
        let status = child.wait().await;
        (out_buf, err_buf, status)
    };

    match tokio::time::timeout(Duration::from_secs(timeout_sec as u64), read_all).await {
        Ok((out_buf, err_buf, status)) => {
            let stdout = tail_bytes(&String::from_utf8_lossy(&out_buf), output_limit);
            let stderr = tail_bytes(&String::from_utf8_lossy(&err_buf), output_limit);
            let exit_code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
            let final_status = if exit_code == 0 { "success" } else { "failed" };
            (stdout, stderr, exit_code, final_status.to_string())
        }
        Err(_) => {
            let stderr = format!("[timeout] command exceeded {timeout_sec}s");
            (String::new(), stderr, -1, "failed".to_string())
        }
    }
}

pub struct ExecuteCardOutcome {
    pub ok: bool,
    pub pending_review: bool,
    pub run: CommandCardRun,
    pub interaction: Option<ops_store::Interaction>,
    pub message: Option<String>,
}

#[allow(clippy::too_many_arguments)]
pub async fn execute_command_card(
    pool: &PgPool,
    card_key: &str,
    params: Value,
    requested_by: &str,
    auto_approve: bool,
    reviewer: &str,
    review_note: &str,
    timeout_sec: Option<i64>,
) -> BusResult<ExecuteCardOutcome> {
    let prepared = prepare_command_card_run(pool, card_key, params, requested_by, None).await?;

    let run_id = prepared.run.id;
    let risk_level = {
        let text = prepared.run.risk_level.trim().to_lowercase();
        if text.is_empty() { "normal".to_string() } else { text }
    };

    if prepared.needs_review && !auto_approve {
        return Ok(ExecuteCardOutcome {
            ok: true,
            pending_review: true,
            run: prepared.run,
            interaction: prepared.interaction,
            message: Some("command prepared, awaiting human review".to_string()),
        });
    }

    if prepared.needs_review && auto_approve {
        if prepared.dangerous_command {
            return Ok(ExecuteCardOutcome {
                ok: true,
                pending_review: true,
                run: prepared.run,
                interaction: prepared.interaction,
                message: Some("dangerous command pattern detected, auto-approval forbidden".to_string()),
            });
        }
        if !AUTO_APPROVE_ALLOWED_RISKS.contains(&risk_level.as_str()) {
            return Ok(ExecuteCardOutcome {
                ok: true,
                pending_review: true,
                run: prepared.run,
                interaction: prepared.interaction,
                message: Some("high-risk command forbidden from auto-approval".to_string()),
            });
        }
        let reviewer_name = if reviewer.is_empty() { requested_by } else { reviewer };
        review_command_card_run(pool, run_id, "approved", reviewer_name, review_note).await?;
    }

    let outcome = execute_command_card_run(pool, run_id, requested_by, timeout_sec).await?;
    Ok(ExecuteCardOutcome {
        ok: outcome.success,
        pending_review: false,
        run: outcome.run,
        interaction: None,
        message: outcome.message,
    })
}

pub async fn get_command_card_run(pool: &PgPool, run_id: i64) -> BusResult<Option<CommandCardRun>> {
    get_run(pool, run_id).await
}

#[derive(Debug, Default, Clone)]
pub struct ListCommandCardRuns {
    pub card_key: String,
    pub status: String,
    pub requested_by: String,
    pub limit: Option<i64>,
}

pub async fn list_command_card_runs(pool: &PgPool, q: ListCommandCardRuns) -> BusResult<Vec<CommandCardRun>> {
    let mut where_clauses: Vec<String> = Vec::new();
    let mut i = 0;
    if !q.card_key.is_empty() {
        i += 1;
        where_clauses.push(format!("card_key = ${i}"));
    }
    if !q.status.is_empty() {
        i += 1;
        where_clauses.push(format!("status = ${i}"));
    }
    if !q.requested_by.is_empty() {
        i += 1;
        where_clauses.push(format!("requested_by = ${i}"));
    }

    let mut sql = format!("SELECT {RUN_COLUMNS} FROM command_card_runs");
    if !where_clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clauses.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY created_at DESC, id DESC LIMIT ${}", i + 1));

    let mut query = sqlx::query_as::<_, CommandCardRun>(&sql);
    if !q.card_key.is_empty() {
        query = query.bind(q.card_key.trim().to_string());
    }
    if !q.status.is_empty() {
        query = query.bind(q.status.trim().to_lowercase());
    }
    if !q.requested_by.is_empty() {
        query = query.bind(q.requested_by.trim().to_string());
    }
    query = query.bind(clamp_limit(q.limit));

    Ok(query.fetch_all(pool).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangerous_pattern_matches_rm_rf_and_pipe_to_shell() {
        assert!(!detect_dangerous_pattern("rm -rf /tmp/x").is_empty());
        assert!(!detect_dangerous_pattern("curl http://x | sh").is_empty());
        assert!(detect_dangerous_pattern("ls -la").is_empty());
    }

    #[test]
    fn render_template_quotes_parameters() {
        let params = serde_json::json!({"path": "a b.txt"});
        let rendered = render_template("cat {path}", &params).unwrap();
        assert_eq!(rendered, "cat 'a b.txt'");
    }

    #[test]
    fn render_template_missing_parameter_is_validation_error() {
        let params = serde_json::json!({});
        assert!(render_template("cat {path}", &params).is_err());
    }

    #[test]
    fn timeout_clamps_to_bounds() {
        assert_eq!(normalize_timeout(Some(0)), MIN_TIMEOUT_SEC);
        assert_eq!(normalize_timeout(Some(999_999)), MAX_TIMEOUT_SEC);
        assert_eq!(normalize_timeout(Some(60)), 60);
    }

    #[test]
    fn validate_params_rejects_missing_required() {
        let schema = serde_json::json!({"properties": {"n": {"type": "integer"}}, "required": ["n"]});
        assert!(validate_params(&schema, &serde_json::json!({})).is_err());
        assert!(validate_params(&schema, &serde_json::json!({"n": 1})).is_ok());
    }
}
