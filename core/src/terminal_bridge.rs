//! Terminal bridge interface (spec §4.J): the seam between the orchestration
//! bus and whatever actually owns the worker fleet's interactive sessions
//! (iTerm, tmux, a remote pty service, ...).
//!
//! Shaped after the teacher's `Tool` trait (`name`/`spec`/`call`) — an
//! `async_trait` object behind `Arc<dyn TerminalBridge>` rather than a
//! generic, so the agent monitor and the `iterm` tool can both hold one
//! trait object without knowing the concrete backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BusError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub agent_id: String,
    pub agent_name: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRow {
    pub agent_id: String,
    pub output: Vec<String>,
    pub error: String,
}

#[async_trait]
pub trait TerminalBridge: Send + Sync {
    /// Lists the live sessions the bridge currently tracks.
    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, BusError>;

    /// Reads recent output lines, either for one `agent_id` or (when
    /// `all_agents` is true) for every tracked session at once.
    async fn read_output(
        &self,
        agent_id: Option<&str>,
        all_agents: bool,
        read_lines: usize,
    ) -> Result<Vec<OutputRow>, BusError>;

    /// Sends literal input (keystrokes) to a session.
    async fn send_input(&self, agent_id: &str, input: &str) -> Result<(), BusError>;

    /// Reads a full-screen snapshot (not just the scrollback tail).
    async fn read_screen(&self, agent_id: &str) -> Result<String, BusError>;

    /// Starts a background streamer pushing output events for `agent_id`.
    async fn start_streamer(&self, agent_id: &str) -> Result<(), BusError>;

    /// Stops a previously started streamer. No-op if none was running.
    async fn stop_streamer(&self, agent_id: &str) -> Result<(), BusError>;
}

/// Test double: every operation fails with `ExternalUnavailable`, matching
/// a bridge that was never wired up to a real backend.
pub struct NullBridge;

#[async_trait]
impl TerminalBridge for NullBridge {
    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, BusError> {
        Err(BusError::ExternalUnavailable("no terminal bridge configured".to_string()))
    }

    async fn read_output(
        &self,
        _agent_id: Option<&str>,
        _all_agents: bool,
        _read_lines: usize,
    ) -> Result<Vec<OutputRow>, BusError> {
        Err(BusError::ExternalUnavailable("no terminal bridge configured".to_string()))
    }

    async fn send_input(&self, _agent_id: &str, _input: &str) -> Result<(), BusError> {
        Err(BusError::ExternalUnavailable("no terminal bridge configured".to_string()))
    }

    async fn read_screen(&self, _agent_id: &str) -> Result<String, BusError> {
        Err(BusError::ExternalUnavailable("no terminal bridge configured".to_string()))
    }

    async fn start_streamer(&self, _agent_id: &str) -> Result<(), BusError> {
        Err(BusError::ExternalUnavailable("no terminal bridge configured".to_string()))
    }

    async fn stop_streamer(&self, _agent_id: &str) -> Result<(), BusError> {
        Err(BusError::ExternalUnavailable("no terminal bridge configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_bridge_reports_external_unavailable() {
        let bridge = NullBridge;
        let err = bridge.list_sessions().await.unwrap_err();
        assert_eq!(err.kind(), "external_unavailable");
    }
}
