use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "LOON_LOG";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("loon").join("loon.log"))
}

/// Routes `tracing` output to the log file so the terminal stays untouched.
///
/// Returns the path written to. Calling it twice is an error.
pub fn init(path: Option<PathBuf>) -> Result<PathBuf> {
    let path = path
        .or_else(default_log_path)
        .context("logging: unable to determine log directory")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("logging: failed to create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("logging: failed to open {}", path.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(file);
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .try_init()
        .map_err(|err| anyhow::anyhow!("logging: {err}"))?;
    let _ = LOG_GUARD.set(guard);

    tracing::info!(path = %path.display(), version = crate::VERSION, "logging initialized");
    Ok(path)
}

/// Logs to stderr for one-shot runs that do not take over the terminal.
pub fn init_stderr() -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("logging: {err}"))
}
