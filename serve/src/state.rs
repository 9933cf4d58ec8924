//! Shared axum state: pool, event bus, terminal bridge, monitor lifecycle.

use std::sync::Arc;

use bus_event::EventBus;
use orch_core::{NullBridge, TerminalBridge};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

pub struct AppState {
    pub pool: PgPool,
    pub bus: Arc<EventBus>,
    pub bridge: Arc<dyn TerminalBridge>,
    pub monitor_cancel: CancellationToken,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            bus: Arc::new(EventBus::new(uuid::Uuid::new_v4().to_string())),
            bridge: Arc::new(NullBridge),
            monitor_cancel: CancellationToken::new(),
        }
    }

    pub fn with_bridge(pool: PgPool, bridge: Arc<dyn TerminalBridge>) -> Self {
        Self {
            pool,
            bus: Arc::new(EventBus::new(uuid::Uuid::new_v4().to_string())),
            bridge,
            monitor_cancel: CancellationToken::new(),
        }
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.monitor_cancel.cancel();
    }
}
