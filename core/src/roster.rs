//! Agent registry / roster (spec §4.K `interaction.roster` / `.register`).
//!
//! Grounded in `original_source/dashboard.py`'s lifecycle-snapshot code,
//! which augments the live iTerm session list with agents found in
//! `data/agent_registry.json` (`{agent_id: {agent_name, skills}}`) so an
//! agent that has no terminal session yet still shows up as `registered`.
//! The LLM-driven lifecycle decision loop that consumes this snapshot is
//! intentionally not reimplemented (recorded as an Open Question decision).

use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::audit::{append_event, AppendEvent};
use crate::error::{BusError, BusResult};

const XDG_APP_NAME: &str = "orchestrator-bus";
const REGISTRY_FILENAME: &str = "agent_registry.json";

static REGISTRY_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub agent_id: String,
    pub agent_name: String,
    pub skills: Vec<String>,
}

fn registry_path() -> BusResult<PathBuf> {
    let base = cross_xdg::BaseDirs::new()
        .map_err(|e| BusError::InternalInvariant(format!("XDG base dirs unavailable: {e}")))?;
    Ok(base.state_home().join(XDG_APP_NAME).join(REGISTRY_FILENAME))
}

fn read_registry(path: &PathBuf) -> BusResult<Vec<RosterEntry>> {
    match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
        Ok(text) => {
            let map: std::collections::BTreeMap<String, Value> = serde_json::from_str(&text)
                .map_err(|e| BusError::InternalInvariant(format!("corrupt agent registry: {e}")))?;
            map.into_iter()
                .map(|(agent_id, info)| {
                    Ok(RosterEntry {
                        agent_id,
                        agent_name: info.get("agent_name").and_then(Value::as_str).unwrap_or_default().to_string(),
                        skills: info
                            .get("skills")
                            .and_then(Value::as_array)
                            .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                            .unwrap_or_default(),
                    })
                })
                .collect()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(BusError::InternalInvariant(format!("failed to read agent registry: {e}"))),
    }
}

fn write_registry(path: &PathBuf, entries: &[RosterEntry]) -> BusResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| BusError::InternalInvariant(format!("failed to create state dir: {e}")))?;
    }
    let map: std::collections::BTreeMap<&str, Value> = entries
        .iter()
        .map(|e| (e.agent_id.as_str(), serde_json::json!({"agent_name": e.agent_name, "skills": e.skills})))
        .collect();
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, serde_json::to_string_pretty(&map).unwrap())
        .map_err(|e| BusError::InternalInvariant(format!("failed to write temp agent registry: {e}")))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| BusError::InternalInvariant(format!("failed to install agent registry: {e}")))?;
    Ok(())
}

/// Upserts an agent into the registry so it appears on the roster even
/// before it opens a terminal session.
pub async fn register_agent(
    pool: &PgPool,
    agent_id: &str,
    agent_name: &str,
    skills: Vec<String>,
) -> BusResult<RosterEntry> {
    let _guard = REGISTRY_LOCK.lock().await;
    let path = registry_path()?;
    let mut entries = read_registry(&path)?;

    let entry = RosterEntry {
        agent_id: agent_id.to_string(),
        agent_name: if agent_name.is_empty() { agent_id.to_string() } else { agent_name.to_string() },
        skills,
    };

    match entries.iter().position(|e| e.agent_id == agent_id) {
        Some(idx) => entries[idx] = entry.clone(),
        None => entries.push(entry.clone()),
    }
    write_registry(&path, &entries)?;

    append_event(
        pool,
        AppendEvent {
            event_type: "interaction".to_string(),
            action: "register".to_string(),
            result: "ok".to_string(),
            actor: agent_id.to_string(),
            target: agent_id.to_string(),
            detail: entry.agent_name.clone(),
            level: "INFO".to_string(),
            extra: None,
        },
    )
    .await?;

    Ok(entry)
}

pub async fn roster() -> BusResult<Vec<RosterEntry>> {
    read_registry(&registry_path()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_file_yields_empty_roster() {
        let entries = read_registry(&PathBuf::from("/nonexistent/agent_registry.json")).unwrap();
        assert!(entries.is_empty());
    }
}
