//! Tracing configuration and log routing.
//!
//! Logs go to stdout through a compact formatter and are mirrored to a file. `SITEBRIEF_LOG_FILE`
//! selects the file; without it the writer appends to `logs/sitebrief.log`. The file layer uses
//! a non-blocking writer so slow disks never stall request handlers.
use std::sync::OnceLock;

use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::RollingFileAppender,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "SITEBRIEF_LOG_FILE";
const LOG_DIR: &str = "logs";
const LOG_FILE_NAME: &str = "sitebrief.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and file logging.
///
/// - Respects `RUST_LOG` for filtering (defaults to `info`).
/// - Keeps the non-blocking writer guard alive for the process lifetime.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    if let Some(writer) = configure_file_writer() {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

/// Build the non-blocking writer behind the file layer.
///
/// Returns `None` when the log directory cannot be created or the chosen file cannot be opened;
/// stdout logging still works in that case.
fn configure_file_writer() -> Option<NonBlocking> {
    let (non_blocking, guard) = match std::env::var(LOG_FILE_ENV) {
        Ok(path) => tracing_appender::non_blocking(open_log_file(&path)?),
        Err(_) => tracing_appender::non_blocking(default_appender()?),
    };
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}

fn open_log_file(path: &str) -> Option<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .inspect_err(|err| eprintln!("Failed to open log file {path}: {err}"))
        .ok()
}

fn default_appender() -> Option<RollingFileAppender> {
    if let Err(err) = std::fs::create_dir_all(LOG_DIR) {
        eprintln!("Failed to create {LOG_DIR} directory: {err}");
        return None;
    }
    Some(tracing_appender::rolling::never(LOG_DIR, LOG_FILE_NAME))
}
