//! Bridge-local persisted state: the bound chat id and the watchdog on/off
//! flag (spec §4.M: "Authorize by chat id (first `/start` auto-binds if
//! none set)"; `/watchdog` toggles the loop).
//!
//! Grounded in the same atomic-replace JSON-file idiom `orch_core::roster`
//! and `orch_core::state_files` use for their own primitives, generalized
//! to this crate's one small state blob since it has nothing to do with
//! the store layer's own tables.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

const XDG_APP_NAME: &str = "orchestrator-bus";
const STATE_FILENAME: &str = "telegram_bridge.json";

static STATE_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeState {
    pub chat_id: Option<i64>,
    #[serde(default = "default_watchdog_enabled")]
    pub watchdog_enabled: bool,
}

fn default_watchdog_enabled() -> bool {
    true
}

fn state_path() -> std::io::Result<PathBuf> {
    let base = cross_xdg::BaseDirs::new()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    Ok(base.state_home().join(XDG_APP_NAME).join(STATE_FILENAME))
}

pub async fn load() -> BridgeState {
    let _guard = STATE_LOCK.lock().await;
    load_unlocked()
}

fn load_unlocked() -> BridgeState {
    let path = match state_path() {
        Ok(p) => p,
        Err(_) => return BridgeState::default(),
    };
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

async fn save(state: &BridgeState) -> std::io::Result<()> {
    let path = state_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(state).unwrap_or_default())?;
    std::fs::rename(&tmp, &path)
}

/// Binds `chat_id` only if none is bound yet. Returns the chat id that ends
/// up authorized (the existing one if already bound, `chat_id` otherwise).
pub async fn bind_chat_if_unset(chat_id: i64) -> std::io::Result<i64> {
    let _guard = STATE_LOCK.lock().await;
    let mut state = load_unlocked();
    let bound = match state.chat_id {
        Some(existing) => existing,
        None => {
            state.chat_id = Some(chat_id);
            save(&state).await?;
            chat_id
        }
    };
    Ok(bound)
}

pub async fn is_authorized(chat_id: i64) -> bool {
    load().await.chat_id == Some(chat_id)
}

pub async fn toggle_watchdog() -> std::io::Result<bool> {
    let _guard = STATE_LOCK.lock().await;
    let mut state = load_unlocked();
    state.watchdog_enabled = !state.watchdog_enabled;
    save(&state).await?;
    Ok(state.watchdog_enabled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializing_without_watchdog_field_defaults_to_enabled() {
        let state: BridgeState = serde_json::from_str(r#"{"chat_id": 42}"#).unwrap();
        assert_eq!(state.chat_id, Some(42));
        assert!(state.watchdog_enabled);
    }

    #[test]
    fn default_state_has_no_bound_chat() {
        let state = BridgeState::default();
        assert_eq!(state.chat_id, None);
    }
}
