//! Log file setup.
//!
//! The terminal belongs to the TUI, so logs only ever go to a file. Without a
//! log file no subscriber is installed and `tracing` macros are no-ops.

use std::path::Path;

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Environment variable holding the log filter (default `info`).
pub const LOG_ENV: &str = "LB_CONSOLE_LOG";

/// Route all logs to `path`, appending.
///
/// The returned guard flushes buffered lines when dropped; keep it alive
/// until the program exits.
pub fn init_file_logging(path: &Path) -> Result<WorkerGuard> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("Invalid log file path: {}", path.display()))?;
    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(filter),
        )
        .try_init()?;

    Ok(guard)
}
