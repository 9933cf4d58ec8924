//! Dashboard HTTP server for the orchestration bus (spec component 4.L):
//! JSON REST + SSE over `core`/`store`/`bus-event`.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`].

mod app;
mod response;
mod routes;
mod sse;
mod state;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

pub use state::AppState;

use app::router;

const DEFAULT_DASHBOARD_ADDR: &str = "127.0.0.1:8080";

/// Runs the dashboard server on an existing listener. Used by tests (bind
/// to `127.0.0.1:0`, then pass the listener so the OS picks a free port).
pub async fn run_serve_on_listener(
    listener: TcpListener,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("dashboard server listening on http://{}", addr);

    orch_core::monitor::spawn_patrol_loop(
        state.pool.clone(),
        state.bridge.clone(),
        state.monitor_cancel.clone(),
    );
    sse::spawn_agent_status_publisher(state.clone());

    let app = router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Runs the dashboard server. Listens on `addr` (default `127.0.0.1:8080`).
pub async fn run_serve(addr: Option<&str>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_DASHBOARD_ADDR);
    let listener = TcpListener::bind(addr).await?;
    let pool = store::get_pool().await?;
    store::ensure_schema(&pool).await?;
    let state = Arc::new(AppState::new(pool));
    run_serve_on_listener(listener, state).await
}
