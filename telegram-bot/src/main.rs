//! Optional Telegram bridge + watchdog (spec §4.M). Disabled (process exits
//! 0 immediately) when no bot token is configured, matching "Optional. When
//! a bot token is configured" — no literal token default is compiled in.

mod commands;
mod state;
mod watchdog;

use std::sync::Arc;

use teloxide::dispatching::{HandlerExt, UpdateFilterExt};
use teloxide::prelude::*;

use orch_core::NullBridge;

const APP_NAME: &str = "orchestrator-bus";

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_and_apply(APP_NAME, None::<&std::path::Path>) {
        eprintln!("{APP_NAME}: config error: {e}");
        std::process::exit(1);
    }
    let _log_guard = config::init_logging(APP_NAME).ok();

    let token = std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default();
    if token.is_empty() {
        tracing::info!("no TELEGRAM_BOT_TOKEN configured; telegram bridge disabled");
        return;
    }

    let pool = match store::get_pool().await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{APP_NAME}: store connection failed: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = store::ensure_schema(&pool).await {
        eprintln!("{APP_NAME}: schema migration failed: {e}");
        std::process::exit(1);
    }

    // The terminal multiplexer is an external collaborator (spec §4.J) with
    // no in-process implementation here; NullBridge surfaces a clean
    // `external_unavailable` until a real bridge is wired in.
    let bridge: Arc<dyn orch_core::TerminalBridge> = Arc::new(NullBridge);

    let cancel = tokio_util::sync::CancellationToken::new();
    let watchdog_handle = watchdog::spawn(pool.clone(), bridge.clone(), cancel.clone());

    let bot = Bot::new(token);

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<commands::Command>()
                .endpoint(commands::handle_command),
        )
        .branch(dptree::endpoint(commands::handle_text));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![pool, bridge])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    cancel.cancel();
    let _ = watchdog_handle.await;
}
