//! Tracing setup: a compact stdout layer plus an append-only log file.
//!
//! The file location comes from [`LoggingConfig`]; writes go through a non-blocking worker whose
//! guard lives for the rest of the process.
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::OnceLock;

use crate::config::LoggingConfig;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber.
///
/// `RUST_LOG` controls filtering (default `info`). If the log file cannot be opened the server
/// keeps running with stdout only. Later calls leave the first subscriber in place.
pub fn init_tracing(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let file_error = match open_log_file(&config.log_file) {
        Ok(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false);
            if registry.with(file_layer).try_init().is_err() {
                return;
            }
            None
        }
        Err(err) => {
            if registry.try_init().is_err() {
                return;
            }
            Some(err)
        }
    };

    if let Some(err) = file_error {
        tracing::warn!(
            path = %config.log_file.display(),
            error = %err,
            "File logging disabled"
        );
    }
}

fn open_log_file(path: &Path) -> std::io::Result<NonBlocking> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    if LOG_GUARD.set(guard).is_err() {
        return Err(std::io::Error::other("log writer already installed"));
    }
    Ok(writer)
}
