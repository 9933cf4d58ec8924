//! File-backed task / approval / lock coordination primitives (spec §4.K).
//!
//! Command-cards and interactions live in SQL (`ops_store`); these three
//! stay as JSON files the way the original keeps them, one file per
//! primitive under `$XDG_STATE_HOME/orchestrator-bus/`, written with
//! atomic-replace (temp file + rename) and serialized per-file by a
//! `tokio::sync::Mutex` so two concurrent tool calls never interleave a
//! read-modify-write cycle.
//!
//! No dedicated write-path source file survives in the retrieval pack for
//! these three primitives — only read-side dashboard projections of
//! `agent_tasks.json` do, which confirm the task schema but not the
//! mutation rules. The id schemes, retry/idempotency/lock-TTL semantics
//! below are grounded directly in spec text (§3, §4.K).

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::audit::{append_event, AppendEvent};
use crate::error::{BusError, BusResult};

const XDG_APP_NAME: &str = "orchestrator-bus";
const TASKS_FILENAME: &str = "tasks.json";
const APPROVALS_FILENAME: &str = "approvals.json";
const LOCKS_FILENAME: &str = "locks.json";

const TASK_PRIORITIES: &[&str] = &["low", "normal", "high", "critical"];
const TASK_STATUSES: &[&str] = &["pending", "in_progress", "blocked", "done", "failed", "cancelled"];
const TASK_TERMINAL_STATUSES: &[&str] = &["done", "cancelled"];

pub const MIN_LOCK_TTL_SEC: i64 = 30;

static TASKS_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static APPROVALS_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static LOCKS_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static TASK_SEQ: AtomicI64 = AtomicI64::new(0);

fn state_file_path(filename: &str) -> BusResult<PathBuf> {
    let base = cross_xdg::BaseDirs::new()
        .map_err(|e| BusError::InternalInvariant(format!("XDG base dirs unavailable: {e}")))?;
    Ok(base.state_home().join(XDG_APP_NAME).join(filename))
}

fn read_json_array(path: &PathBuf) -> BusResult<Vec<Value>> {
    match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
        Ok(text) => serde_json::from_str(&text)
            .map_err(|e| BusError::InternalInvariant(format!("corrupt state file {}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(BusError::InternalInvariant(format!("failed to read {}: {e}", path.display()))),
    }
}

fn write_json_array(path: &PathBuf, rows: &[Value]) -> BusResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| BusError::InternalInvariant(format!("failed to create state dir: {e}")))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, serde_json::to_string_pretty(rows).unwrap())
        .map_err(|e| BusError::InternalInvariant(format!("failed to write temp state file: {e}")))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| BusError::InternalInvariant(format!("failed to install state file: {e}")))?;
    Ok(())
}

fn parse_row<T: for<'de> Deserialize<'de>>(row: &Value) -> BusResult<T> {
    serde_json::from_value(row.clone()).map_err(|e| BusError::InternalInvariant(format!("corrupt state row: {e}")))
}

// ---------------------------------------------------------------- Task ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub creator: String,
    pub assignee: String,
    pub priority: String,
    pub status: String,
    pub result: String,
    pub project_id: String,
    pub depends_on: Vec<String>,
    pub timeout_sec: i64,
    pub max_retries: i64,
    pub retry_count: i64,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `T` + monotonic counter of `now_ms mod 1e8` (spec §4.K). The in-process
/// sequence nudges past same-millisecond collisions; the file lock already
/// serializes every call site.
fn next_task_id() -> String {
    let now_ms = Utc::now().timestamp_millis();
    let seq = TASK_SEQ.fetch_add(1, Ordering::SeqCst);
    let value = (now_ms + seq).rem_euclid(100_000_000);
    format!("T{value:08}")
}

fn task_is_ready(task: &Task, all: &[Task]) -> bool {
    if task.status != "pending" {
        return false;
    }
    task.depends_on.iter().all(|dep| {
        all.iter()
            .find(|t| &t.task_id == dep)
            .map(|t| t.status == "done" || t.status == "cancelled")
            .unwrap_or(false)
    })
}

#[derive(Debug, Default, Clone)]
pub struct CreateTask {
    pub title: String,
    pub description: String,
    pub creator: String,
    pub assignee: String,
    pub priority: String,
    pub project_id: String,
    pub depends_on: Vec<String>,
    pub timeout_sec: Option<i64>,
    pub max_retries: Option<i64>,
    pub idempotency_key: String,
}

/// Creates a task, or returns the existing row if `idempotency_key` already
/// matches one (spec §4.K invariant 7: same key twice → same `task_id`).
pub async fn create_task(pool: &PgPool, input: CreateTask) -> BusResult<Task> {
    let _guard = TASKS_LOCK.lock().await;
    let path = state_file_path(TASKS_FILENAME)?;
    let mut rows = read_json_array(&path)?;

    if !input.idempotency_key.trim().is_empty() {
        if let Some(existing) = rows
            .iter()
            .find(|r| r.get("idempotency_key").and_then(Value::as_str) == Some(input.idempotency_key.as_str()))
        {
            return parse_row(existing);
        }
    }

    let priority = if TASK_PRIORITIES.contains(&input.priority.as_str()) {
        input.priority
    } else {
        "normal".to_string()
    };
    let now = Utc::now();
    let task = Task {
        task_id: next_task_id(),
        title: input.title,
        description: input.description,
        creator: input.creator,
        assignee: input.assignee,
        priority,
        status: "pending".to_string(),
        result: String::new(),
        project_id: input.project_id,
        depends_on: input.depends_on,
        timeout_sec: input.timeout_sec.unwrap_or(0).max(0),
        max_retries: input.max_retries.unwrap_or(0).max(0),
        retry_count: 0,
        idempotency_key: input.idempotency_key,
        created_at: now,
        updated_at: now,
    };

    rows.push(serde_json::to_value(&task).unwrap());
    write_json_array(&path, &rows)?;

    append_event(
        pool,
        AppendEvent {
            event_type: "task".to_string(),
            action: "create".to_string(),
            result: "ok".to_string(),
            actor: task.creator.clone(),
            target: task.task_id.clone(),
            detail: task.title.clone(),
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(task)
}

#[derive(Debug, Default, Clone)]
pub struct ListTasks {
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub project_id: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_tasks(filter: ListTasks) -> BusResult<Vec<Task>> {
    let path = state_file_path(TASKS_FILENAME)?;
    let rows = read_json_array(&path)?;
    let mut tasks: Vec<Task> = rows.iter().map(parse_row).collect::<BusResult<_>>()?;
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    if let Some(status) = &filter.status {
        tasks.retain(|t| &t.status == status);
    }
    if let Some(assignee) = &filter.assignee {
        tasks.retain(|t| &t.assignee == assignee);
    }
    if let Some(project_id) = &filter.project_id {
        tasks.retain(|t| &t.project_id == project_id);
    }
    let max_items = config::normalize_limit(filter.limit, 100, 1000) as usize;
    tasks.truncate(max_items);
    Ok(tasks)
}

pub async fn get_task(task_id: &str) -> BusResult<Option<Task>> {
    let path = state_file_path(TASKS_FILENAME)?;
    let rows = read_json_array(&path)?;
    rows.iter()
        .find(|r| r.get("task_id").and_then(Value::as_str) == Some(task_id))
        .map(parse_row)
        .transpose()
}

/// Lists tasks satisfying the ready invariant (spec §3): `status=pending`
/// and every dependency is `done` or `cancelled`.
pub async fn ready_tasks() -> BusResult<Vec<Task>> {
    let path = state_file_path(TASKS_FILENAME)?;
    let rows = read_json_array(&path)?;
    let all: Vec<Task> = rows.iter().map(parse_row).collect::<BusResult<_>>()?;
    Ok(all.iter().filter(|t| task_is_ready(t, &all)).cloned().collect())
}

async fn with_task<F>(pool: &PgPool, task_id: &str, action: &str, actor: &str, mutate: F) -> BusResult<Task>
where
    F: FnOnce(&mut Task) -> BusResult<()>,
{
    let _guard = TASKS_LOCK.lock().await;
    let path = state_file_path(TASKS_FILENAME)?;
    let mut rows = read_json_array(&path)?;

    let idx = rows
        .iter()
        .position(|r| r.get("task_id").and_then(Value::as_str) == Some(task_id))
        .ok_or_else(|| BusError::NotFound(format!("task not found: {task_id}")))?;

    let mut task: Task = parse_row(&rows[idx])?;
    mutate(&mut task)?;
    task.updated_at = Utc::now();
    rows[idx] = serde_json::to_value(&task).unwrap();
    write_json_array(&path, &rows)?;

    append_event(
        pool,
        AppendEvent {
            event_type: "task".to_string(),
            action: action.to_string(),
            result: "ok".to_string(),
            actor: actor.to_string(),
            target: task_id.to_string(),
            detail: task.status.clone(),
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(task)
}

#[derive(Debug, Default, Clone)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub result: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateTaskOutcome {
    pub task: Task,
    pub auto_retried: bool,
}

/// Updates task fields. A `status: "failed"` transition auto-retries when
/// budget remains (spec §4.K): bumps `retry_count`, reverts status to
/// `pending`, and prefixes the stored result with `[重试 k/N]`.
pub async fn update_task(pool: &PgPool, task_id: &str, actor: &str, input: UpdateTask) -> BusResult<UpdateTaskOutcome> {
    let auto_retried = std::cell::Cell::new(false);
    let task = with_task(pool, task_id, "update", actor, |task| {
        if TASK_TERMINAL_STATUSES.contains(&task.status.as_str()) {
            return Err(BusError::StateConflict(format!("task already terminal: {}", task.status)));
        }
        if let Some(title) = input.title {
            task.title = title;
        }
        if let Some(description) = input.description {
            task.description = description;
        }
        if let Some(priority) = input.priority {
            if TASK_PRIORITIES.contains(&priority.as_str()) {
                task.priority = priority;
            }
        }
        if let Some(result) = input.result {
            task.result = result;
        }
        if let Some(status) = input.status {
            if status == "failed" && task.retry_count < task.max_retries {
                task.retry_count += 1;
                task.status = "pending".to_string();
                task.result = format!("[重试 {}/{}] {}", task.retry_count, task.max_retries, task.result);
                auto_retried.set(true);
            } else if TASK_STATUSES.contains(&status.as_str()) {
                task.status = status;
            } else {
                return Err(BusError::Validation(format!("invalid status: {status}")));
            }
        }
        Ok(())
    })
    .await?;
    Ok(UpdateTaskOutcome { task, auto_retried: auto_retried.get() })
}

pub async fn assign_task(pool: &PgPool, task_id: &str, assignee: &str, actor: &str) -> BusResult<Task> {
    let assignee = assignee.to_string();
    with_task(pool, task_id, "assign", actor, move |task| {
        if TASK_TERMINAL_STATUSES.contains(&task.status.as_str()) {
            return Err(BusError::StateConflict(format!("task already terminal: {}", task.status)));
        }
        task.assignee = assignee;
        Ok(())
    })
    .await
}

pub async fn progress_task(pool: &PgPool, task_id: &str, note: &str, actor: &str) -> BusResult<Task> {
    let note = note.to_string();
    with_task(pool, task_id, "progress", actor, move |task| {
        if TASK_TERMINAL_STATUSES.contains(&task.status.as_str()) {
            return Err(BusError::StateConflict(format!("task already terminal: {}", task.status)));
        }
        task.status = "in_progress".to_string();
        task.result = if task.result.is_empty() { note } else { format!("{}\n{}", task.result, note) };
        Ok(())
    })
    .await
}

pub async fn cancel_task(pool: &PgPool, task_id: &str, reason: &str, actor: &str) -> BusResult<Task> {
    let reason = reason.to_string();
    with_task(pool, task_id, "cancel", actor, move |task| {
        if TASK_TERMINAL_STATUSES.contains(&task.status.as_str()) {
            return Err(BusError::StateConflict(format!("task already terminal: {}", task.status)));
        }
        task.status = "cancelled".to_string();
        if !reason.is_empty() {
            task.result = reason;
        }
        Ok(())
    })
    .await
}

// ------------------------------------------------------------ Approval ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub approval_id: String,
    pub requester: String,
    pub target_agent: String,
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    pub status: String,
    pub decision: String,
    pub approver: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// `A` + zero-padded 8-digit counter (spec §4.K), derived from the highest
/// existing suffix rather than row count so a prior deletion never reissues
/// an id.
fn next_approval_id(existing: &[Value]) -> String {
    let max = existing
        .iter()
        .filter_map(|r| r.get("approval_id").and_then(Value::as_str))
        .filter_map(|s| s.strip_prefix('A'))
        .filter_map(|s| s.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("A{:08}", max + 1)
}

#[derive(Debug, Default, Clone)]
pub struct RequestApproval {
    pub requester: String,
    pub target_agent: String,
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
}

pub async fn request_approval(pool: &PgPool, input: RequestApproval) -> BusResult<Approval> {
    let _guard = APPROVALS_LOCK.lock().await;
    let path = state_file_path(APPROVALS_FILENAME)?;
    let mut rows = read_json_array(&path)?;

    let approval = Approval {
        approval_id: next_approval_id(&rows),
        requester: input.requester,
        target_agent: input.target_agent,
        title: input.title,
        description: input.description,
        options: input.options,
        status: "pending".to_string(),
        decision: String::new(),
        approver: String::new(),
        reason: String::new(),
        created_at: Utc::now(),
        resolved_at: None,
    };

    rows.push(serde_json::to_value(&approval).unwrap());
    write_json_array(&path, &rows)?;

    append_event(
        pool,
        AppendEvent {
            event_type: "approval".to_string(),
            action: "request".to_string(),
            result: "ok".to_string(),
            actor: approval.requester.clone(),
            target: approval.approval_id.clone(),
            detail: approval.title.clone(),
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(approval)
}

/// Resolves a pending approval. `decision` is stored verbatim (spec §4.K:
/// "respond requires both id and decision").
pub async fn respond_approval(
    pool: &PgPool,
    approval_id: &str,
    decision: &str,
    approver: &str,
    reason: &str,
) -> BusResult<Approval> {
    if decision.trim().is_empty() {
        return Err(BusError::Validation("decision is required".to_string()));
    }

    let _guard = APPROVALS_LOCK.lock().await;
    let path = state_file_path(APPROVALS_FILENAME)?;
    let mut rows = read_json_array(&path)?;

    let idx = rows
        .iter()
        .position(|r| r.get("approval_id").and_then(Value::as_str) == Some(approval_id))
        .ok_or_else(|| BusError::NotFound(format!("approval not found: {approval_id}")))?;

    let mut approval: Approval = parse_row(&rows[idx])?;
    if approval.status != "pending" {
        return Err(BusError::StateConflict(format!("approval already resolved: {}", approval.status)));
    }

    approval.status = "resolved".to_string();
    approval.decision = decision.to_string();
    approval.approver = approver.to_string();
    approval.reason = reason.to_string();
    approval.resolved_at = Some(Utc::now());

    rows[idx] = serde_json::to_value(&approval).unwrap();
    write_json_array(&path, &rows)?;

    append_event(
        pool,
        AppendEvent {
            event_type: "approval".to_string(),
            action: "respond".to_string(),
            result: "ok".to_string(),
            actor: approver.to_string(),
            target: approval_id.to_string(),
            detail: decision.to_string(),
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(approval)
}

pub async fn list_approvals_in_tool(status: Option<&str>, limit: Option<i64>) -> BusResult<Vec<Approval>> {
    let path = state_file_path(APPROVALS_FILENAME)?;
    let rows = read_json_array(&path)?;
    let mut approvals: Vec<Approval> = rows.iter().map(parse_row).collect::<BusResult<_>>()?;
    approvals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    if let Some(status) = status {
        approvals.retain(|a| a.status == status);
    }
    let max_items = config::normalize_limit(limit, 100, 1000) as usize;
    approvals.truncate(max_items);
    Ok(approvals)
}

pub async fn get_approval_in_tool(approval_id: &str) -> BusResult<Option<Approval>> {
    let path = state_file_path(APPROVALS_FILENAME)?;
    let rows = read_json_array(&path)?;
    rows.iter()
        .find(|r| r.get("approval_id").and_then(Value::as_str) == Some(approval_id))
        .map(parse_row)
        .transpose()
}

// --------------------------------------------------------------- Lock ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLock {
    pub resource: String,
    pub owner: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub renewed_at: Option<DateTime<Utc>>,
}

fn evict_expired(rows: Vec<Value>, now: DateTime<Utc>) -> BusResult<Vec<Value>> {
    let locks: Vec<ResourceLock> = rows.iter().map(parse_row).collect::<BusResult<_>>()?;
    Ok(locks
        .into_iter()
        .filter(|l| l.expires_at >= now)
        .map(|l| serde_json::to_value(&l).unwrap())
        .collect())
}

pub struct AcquireLockOutcome {
    pub ok: bool,
    pub lock: Option<ResourceLock>,
    pub holder: Option<String>,
}

/// Acquires or renews a lease (spec §4.K). A same-owner re-acquire renews
/// `expires_at` to `now + max(30, ttl)`; a different owner's held lock is
/// refused with the current holder reported. Every call first evicts any
/// lock whose lease has lapsed.
pub async fn acquire_lock(pool: &PgPool, resource: &str, owner: &str, ttl_sec: i64) -> BusResult<AcquireLockOutcome> {
    let _guard = LOCKS_LOCK.lock().await;
    let path = state_file_path(LOCKS_FILENAME)?;
    let now = Utc::now();
    let mut rows = evict_expired(read_json_array(&path)?, now)?;

    let ttl = chrono::Duration::seconds(ttl_sec.max(MIN_LOCK_TTL_SEC));
    let idx = rows.iter().position(|r| r.get("resource").and_then(Value::as_str) == Some(resource));

    let outcome = if let Some(idx) = idx {
        let mut lock: ResourceLock = parse_row(&rows[idx])?;
        if lock.owner != owner {
            return Ok(AcquireLockOutcome { ok: false, lock: None, holder: Some(lock.owner) });
        }
        lock.expires_at = now + ttl;
        lock.renewed_at = Some(now);
        rows[idx] = serde_json::to_value(&lock).unwrap();
        AcquireLockOutcome { ok: true, lock: Some(lock), holder: None }
    } else {
        let lock = ResourceLock {
            resource: resource.to_string(),
            owner: owner.to_string(),
            acquired_at: now,
            expires_at: now + ttl,
            renewed_at: None,
        };
        rows.push(serde_json::to_value(&lock).unwrap());
        AcquireLockOutcome { ok: true, lock: Some(lock), holder: None }
    };

    write_json_array(&path, &rows)?;

    append_event(
        pool,
        AppendEvent {
            event_type: "lock".to_string(),
            action: "acquire".to_string(),
            result: if outcome.ok { "ok".to_string() } else { "denied".to_string() },
            actor: owner.to_string(),
            target: resource.to_string(),
            detail: outcome.holder.clone().unwrap_or_default(),
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(outcome)
}

pub async fn release_lock(pool: &PgPool, resource: &str, owner: &str) -> BusResult<bool> {
    let _guard = LOCKS_LOCK.lock().await;
    let path = state_file_path(LOCKS_FILENAME)?;
    let mut rows = evict_expired(read_json_array(&path)?, Utc::now())?;

    let idx = rows.iter().position(|r| r.get("resource").and_then(Value::as_str) == Some(resource));
    let released = match idx {
        None => false,
        Some(idx) => {
            let lock: ResourceLock = parse_row(&rows[idx])?;
            if lock.owner != owner {
                return Err(BusError::GuardedDenied(format!("lock held by {}", lock.owner)));
            }
            rows.remove(idx);
            true
        }
    };

    write_json_array(&path, &rows)?;

    append_event(
        pool,
        AppendEvent {
            event_type: "lock".to_string(),
            action: "release".to_string(),
            result: if released { "ok".to_string() } else { "not_found".to_string() },
            actor: owner.to_string(),
            target: resource.to_string(),
            detail: String::new(),
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(released)
}

pub async fn force_release_lock(pool: &PgPool, resource: &str, actor: &str) -> BusResult<bool> {
    let _guard = LOCKS_LOCK.lock().await;
    let path = state_file_path(LOCKS_FILENAME)?;
    let mut rows = evict_expired(read_json_array(&path)?, Utc::now())?;

    let idx = rows.iter().position(|r| r.get("resource").and_then(Value::as_str) == Some(resource));
    let released = idx.is_some();
    if let Some(idx) = idx {
        rows.remove(idx);
    }

    write_json_array(&path, &rows)?;

    append_event(
        pool,
        AppendEvent {
            event_type: "lock".to_string(),
            action: "force_release".to_string(),
            result: if released { "ok".to_string() } else { "not_found".to_string() },
            actor: actor.to_string(),
            target: resource.to_string(),
            detail: String::new(),
            level: "WARN".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(released)
}

pub async fn list_locks() -> BusResult<Vec<ResourceLock>> {
    let path = state_file_path(LOCKS_FILENAME)?;
    let rows = evict_expired(read_json_array(&path)?, Utc::now())?;
    rows.iter().map(parse_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_requires_all_dependencies_done_or_cancelled() {
        let done = Task {
            task_id: "T00000001".to_string(),
            depends_on: vec![],
            status: "done".to_string(),
            ..blank_task()
        };
        let dependent = Task {
            task_id: "T00000002".to_string(),
            depends_on: vec!["T00000001".to_string()],
            status: "pending".to_string(),
            ..blank_task()
        };
        let all = vec![done, dependent.clone()];
        assert!(task_is_ready(&dependent, &all));
    }

    #[test]
    fn not_ready_when_dependency_still_pending() {
        let blocker = Task { task_id: "T00000001".to_string(), status: "pending".to_string(), ..blank_task() };
        let dependent = Task {
            task_id: "T00000002".to_string(),
            depends_on: vec!["T00000001".to_string()],
            status: "pending".to_string(),
            ..blank_task()
        };
        let all = vec![blocker, dependent.clone()];
        assert!(!task_is_ready(&dependent, &all));
    }

    #[test]
    fn approval_id_counter_skips_past_existing_max() {
        let existing = vec![serde_json::json!({"approval_id": "A00000005"})];
        assert_eq!(next_approval_id(&existing), "A00000006");
    }

    #[test]
    fn task_id_has_expected_shape() {
        let id = next_task_id();
        assert_eq!(id.len(), 9);
        assert!(id.starts_with('T'));
    }

    fn blank_task() -> Task {
        let now = Utc::now();
        Task {
            task_id: String::new(),
            title: String::new(),
            description: String::new(),
            creator: String::new(),
            assignee: String::new(),
            priority: "normal".to_string(),
            status: "pending".to_string(),
            result: String::new(),
            project_id: String::new(),
            depends_on: vec![],
            timeout_sec: 0,
            max_retries: 0,
            retry_count: 0,
            idempotency_key: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
