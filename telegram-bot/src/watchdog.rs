//! Watchdog loop (spec §4.M): on a timer, nudges the master session (when
//! `include_master` is set) and every registered worker session, and
//! records how many nudges actually landed.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use orch_core::audit::{append_event, AppendEvent};
use orch_core::terminal_bridge::TerminalBridge;

use crate::state;

const MASTER_AGENT_ID: &str = "master";
const DEFAULT_NUDGE_TEXT: &str = "watchdog: still there?";

fn watchdog_interval_sec() -> i64 {
    config::as_int_env("TELEGRAM_WATCHDOG_INTERVAL_SEC", 120, 30, i64::MAX / 1_000)
}

fn include_master() -> bool {
    config::as_bool_env("TELEGRAM_WATCHDOG_INCLUDE_MASTER", true)
}

struct TickOutcome {
    sent: usize,
    skipped: usize,
}

async fn tick(pool: &PgPool, bridge: &Arc<dyn TerminalBridge>) -> TickOutcome {
    let mut sent = 0usize;
    let mut skipped = 0usize;

    if include_master() {
        match bridge.send_input(MASTER_AGENT_ID, DEFAULT_NUDGE_TEXT).await {
            Ok(()) => sent += 1,
            Err(_) => skipped += 1,
        }
    }

    match bridge.list_sessions().await {
        Ok(sessions) => {
            for session in sessions {
                if session.agent_id == MASTER_AGENT_ID {
                    continue;
                }
                match bridge.send_input(&session.agent_id, DEFAULT_NUDGE_TEXT).await {
                    Ok(()) => sent += 1,
                    Err(_) => skipped += 1,
                }
            }
        }
        Err(_) => skipped += 1,
    }

    let _ = append_event(
        pool,
        AppendEvent {
            event_type: "telegram".to_string(),
            action: "watchdog_tick".to_string(),
            result: "ok".to_string(),
            actor: "watchdog".to_string(),
            target: "fleet".to_string(),
            detail: format!("sent={sent} skipped={skipped}"),
            level: "info".to_string(),
            extra: None,
        },
    )
    .await;

    TickOutcome { sent, skipped }
}

/// Spawns the watchdog loop. Each tick is skipped (not stopped) while
/// `/watchdog` has toggled it off, so toggling back on resumes immediately
/// on the next timer without restarting the task.
pub fn spawn(pool: PgPool, bridge: Arc<dyn TerminalBridge>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(watchdog_interval_sec() as u64));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !state::load().await.watchdog_enabled {
                        continue;
                    }
                    let outcome = tick(&pool, &bridge).await;
                    tracing::info!(sent = outcome.sent, skipped = outcome.skipped, "watchdog tick");
                }
            }
        }
    })
}
