//! Shared tracing setup for `cli`, `serve`, and `telegram-bot` (feature
//! `tracing-init`): a daily-rotating file appender under
//! `$XDG_STATE_HOME/<app_name>/logs/`, filtered by `RUST_LOG`/`LOG_LEVEL`
//! (default `info`), retaining `log_rotation_count` files.
//!
//! `log_rotation_bytes` (spec §6 configuration keys) has no equivalent here:
//! size-based truncation needs an unstable `tracing-appender` feature not
//! worth pulling in for this; day-based + count-capped rotation is the
//! stable substitute.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use crate::settings::as_int_env;

/// Must be kept alive for the lifetime of the process — dropping it stops
/// the background flush thread for the file appender.
pub struct LoggingGuard(#[allow(dead_code)] WorkerGuard);

fn log_dir(app_name: &str) -> PathBuf {
    cross_xdg::BaseDirs::new()
        .map(|d| d.state_home().join(app_name).join("logs"))
        .unwrap_or_else(|_| PathBuf::from(".").join(format!(".{app_name}")).join("logs"))
}

/// Initializes the global tracing subscriber once per process. Only the
/// first call in a process takes effect; later calls are harmless no-ops so
/// tests and `main` don't need to coordinate.
pub fn init(app_name: &str) -> Result<LoggingGuard, std::io::Error> {
    let dir = log_dir(app_name);
    std::fs::create_dir_all(&dir)?;

    let rotation_count = as_int_env("LOG_ROTATION_COUNT", 14, 1, 365) as usize;
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(app_name)
        .filename_suffix("log")
        .max_log_files(rotation_count)
        .build(&dir)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::new(level)
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);

    Ok(LoggingGuard(guard))
}
