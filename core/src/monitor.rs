//! Agent monitor (spec §4.I): classifies worker-session health from recent
//! terminal output and drives the background patrol loop that keeps
//! `agent_status` current.
//!
//! Grounded verbatim in `original_source/agent_monitor.py`: ordered
//! classification rules, fingerprint-over-last-6-lines stagnation tracking,
//! and the post-classification "errored output but not yet classified as
//! error/disconnected → disconnected" override.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use sqlx::PgPool;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::agent_status::{self, UpsertAgentStatus};
use crate::terminal_bridge::TerminalBridge;

const ERROR_KEYWORDS: &[&str] = &["traceback", "error", "exception"];
const DISCONNECTED_KEYWORDS: &[&str] = &["timeout", "connection refused", "econnreset"];
const PROMPT_ONLY_MARKERS: &[&str] = &["$", "#", ">>>", "...", ">"];
pub const STATUS_NAMES: &[&str] = &["running", "idle", "stuck", "error", "disconnected", "unknown"];
pub const DEFAULT_STUCK_SEC: i64 = 60;

pub const DEFAULT_TICK_SEC: u64 = 5;
pub const MIN_TICK_SEC: u64 = 1;
pub const MAX_TICK_SEC: u64 = 60;

fn normalize_lines(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_prompt_only(lines: &[String]) -> bool {
    if lines.is_empty() {
        return true;
    }
    lines.iter().all(|line| PROMPT_ONLY_MARKERS.contains(&line.as_str()))
}

/// Classifies a session's runtime status from its recent output (spec §4.I).
pub fn classify_status(lines: &[String], has_session: bool, stagnant_sec: i64) -> &'static str {
    if !has_session {
        return "unknown";
    }

    let normalized = normalize_lines(lines);
    if is_prompt_only(&normalized) {
        return "idle";
    }

    let merged = normalized.join("\n").to_lowercase();

    if ERROR_KEYWORDS.iter().any(|kw| merged.contains(kw)) {
        return "error";
    }
    if DISCONNECTED_KEYWORDS.iter().any(|kw| merged.contains(kw)) {
        return "disconnected";
    }
    if stagnant_sec.max(0) >= DEFAULT_STUCK_SEC {
        return "stuck";
    }
    "running"
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AgentSummary {
    pub total: i64,
    pub healthy: i64,
    pub unhealthy: i64,
    pub running: i64,
    pub idle: i64,
    pub stuck: i64,
    pub error: i64,
    pub disconnected: i64,
    pub unknown: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PatrolAgent {
    pub agent_id: String,
    pub agent_name: String,
    pub session_id: String,
    pub status: String,
    pub stagnant_sec: i64,
    pub error: String,
    pub output_tail: Vec<String>,
}

fn summarize_agents(agents: &[PatrolAgent]) -> AgentSummary {
    let mut summary = AgentSummary::default();
    for agent in agents {
        summary.total += 1;
        match agent.status.as_str() {
            "running" => summary.running += 1,
            "idle" => summary.idle += 1,
            "stuck" => summary.stuck += 1,
            "error" => summary.error += 1,
            "disconnected" => summary.disconnected += 1,
            _ => summary.unknown += 1,
        }
    }
    summary.healthy = summary.running + summary.idle;
    summary.unhealthy = summary.total - summary.healthy;
    summary
}

#[derive(Debug, Clone)]
struct Fingerprint {
    fingerprint: String,
    last_change_ts: f64,
}

/// Tracks per-agent output fingerprints across patrol ticks so stagnation can
/// be measured without re-reading history every cycle.
#[derive(Default)]
pub struct StatusMemory {
    entries: DashMap<String, Fingerprint>,
}

impl StatusMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct PatrolResult {
    pub ok: bool,
    pub error: Option<String>,
    pub summary: AgentSummary,
    pub agents: Vec<PatrolAgent>,
}

/// Runs one patrol cycle: lists sessions, reads their recent output, and
/// classifies each (spec §4.I). `now_ts` is epoch seconds, supplied by the
/// caller so the function stays deterministic for tests.
pub async fn patrol_agents_once(
    bridge: &dyn TerminalBridge,
    memory: &StatusMemory,
    read_lines: usize,
    now_ts: f64,
) -> PatrolResult {
    let sessions = match bridge.list_sessions().await {
        Ok(sessions) => sessions,
        Err(e) => {
            return PatrolResult {
                ok: false,
                error: Some(e.to_string()),
                summary: AgentSummary::default(),
                agents: Vec::new(),
            }
        }
    };

    let rows = match bridge.read_output(None, true, read_lines.max(1)).await {
        Ok(rows) => rows,
        Err(e) => {
            let agents: Vec<PatrolAgent> = sessions
                .into_iter()
                .map(|s| PatrolAgent {
                    agent_id: s.agent_id,
                    agent_name: s.agent_name,
                    session_id: s.session_id,
                    status: "unknown".to_string(),
                    stagnant_sec: 0,
                    error: e.to_string(),
                    output_tail: Vec::new(),
                })
                .collect();
            let summary = summarize_agents(&agents);
            return PatrolResult {
                ok: false,
                error: Some(e.to_string()),
                summary,
                agents,
            };
        }
    };

    let row_by_agent: HashMap<String, crate::terminal_bridge::OutputRow> =
        rows.into_iter().map(|r| (r.agent_id.clone(), r)).collect();

    let mut agents = Vec::with_capacity(sessions.len());
    for session in sessions {
        let row = row_by_agent.get(&session.agent_id);
        let output_tail: Vec<String> = row
            .map(|r| r.output.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let error_text = row.map(|r| r.error.trim().to_string()).unwrap_or_default();
        let has_session = !session.session_id.is_empty() && !error_text.to_lowercase().contains("session not found");

        let fingerprint = output_tail.iter().rev().take(6).rev().cloned().collect::<Vec<_>>().join("\n");
        let last_change_ts = match memory.entries.get(&session.agent_id) {
            Some(prev) if prev.fingerprint == fingerprint => prev.last_change_ts,
            _ => now_ts,
        };
        memory.entries.insert(
            session.agent_id.clone(),
            Fingerprint { fingerprint, last_change_ts },
        );

        let stagnant_sec = ((now_ts - last_change_ts) as i64).max(0);
        let mut status = classify_status(&output_tail, has_session, stagnant_sec).to_string();

        if !error_text.is_empty() && status != "error" && status != "disconnected" {
            status = "disconnected".to_string();
        }
        if !STATUS_NAMES.contains(&status.as_str()) {
            status = "unknown".to_string();
        }

        agents.push(PatrolAgent {
            agent_id: session.agent_id,
            agent_name: session.agent_name,
            session_id: session.session_id,
            status,
            stagnant_sec,
            error: error_text,
            output_tail: output_tail.into_iter().rev().take(20).rev().collect(),
        });
    }

    let summary = summarize_agents(&agents);
    PatrolResult { ok: true, error: None, summary, agents }
}

pub fn resolve_tick_sec() -> u64 {
    let raw = config::as_int_env("AGENT_MONITOR_TICK_SEC", DEFAULT_TICK_SEC as i64, MIN_TICK_SEC as i64, MAX_TICK_SEC as i64);
    raw as u64
}

/// Spawns the background patrol loop: every tick, patrols the fleet and
/// upserts each agent's status into the store. Runs until `token` is
/// cancelled.
pub fn spawn_patrol_loop(
    pool: PgPool,
    bridge: Arc<dyn TerminalBridge>,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let tick_sec = resolve_tick_sec();
    tokio::spawn(async move {
        let memory = StatusMemory::new();
        let mut ticker = interval(Duration::from_secs(tick_sec));
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let now_ts = chrono::Utc::now().timestamp() as f64;
                    let result = patrol_agents_once(bridge.as_ref(), &memory, 30, now_ts).await;
                    for agent in result.agents {
                        let _ = agent_status::upsert_agent_status(
                            &pool,
                            UpsertAgentStatus {
                                agent_id: agent.agent_id,
                                agent_name: agent.agent_name,
                                session_id: agent.session_id,
                                status: agent.status,
                                stagnant_sec: agent.stagnant_sec,
                                error: agent.error,
                                output_tail: agent.output_tail,
                            },
                        )
                        .await;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal_bridge::NullBridge;

    #[test]
    fn classify_status_prioritizes_error_over_disconnected() {
        let lines = vec!["Traceback (most recent call last)".to_string(), "timeout".to_string()];
        assert_eq!(classify_status(&lines, true, 0), "error");
    }

    #[test]
    fn classify_status_idle_for_prompt_only_lines() {
        let lines = vec!["$".to_string()];
        assert_eq!(classify_status(&lines, true, 0), "idle");
    }

    #[test]
    fn classify_status_stuck_past_threshold() {
        let lines = vec!["still compiling".to_string()];
        assert_eq!(classify_status(&lines, true, 60), "stuck");
        assert_eq!(classify_status(&lines, true, 59), "running");
    }

    #[test]
    fn classify_status_unknown_without_session() {
        assert_eq!(classify_status(&[], false, 0), "unknown");
    }

    #[tokio::test]
    async fn patrol_once_reports_error_when_bridge_unavailable() {
        let bridge = NullBridge;
        let memory = StatusMemory::new();
        let result = patrol_agents_once(&bridge, &memory, 30, 0.0).await;
        assert!(!result.ok);
        assert!(result.agents.is_empty());
    }
}
