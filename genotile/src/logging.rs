//! Logging setup for binaries embedding the tile engine.
//!
//! - Writes to `<log_dir>/genotile.log` (cleared on session start)
//! - Also prints to stdout, unless the caller owns the terminal
//! - Filter from `RUST_LOG`, falling back to the given default
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the binary.

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::DEFAULT_LOG_FILE;

/// Directives used when neither `RUST_LOG` nor a configured filter is set.
pub const DEFAULT_FILTER: &str = "info";

/// Keep alive for the whole session; dropping it flushes the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Install the global subscriber.
///
/// Creates `log_dir` if needed and truncates `log_dir/log_file`.
/// `filter` is used when `RUST_LOG` is unset. With `stdout_enabled` false
/// events only go to the file, so progress bars and reports stay intact.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the log file
/// cannot be cleared.
pub fn init_logging(
    log_dir: &Path,
    log_file: &str,
    filter: Option<&str>,
    stdout_enabled: bool,
) -> Result<LoggingGuard, io::Error> {
    prepare_log_file(log_dir, log_file)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE);

    let stdout_layer = stdout_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .with_ansi(true)
            .compact()
    });

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.unwrap_or(DEFAULT_FILTER)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Create the directory and truncate the log file.
fn prepare_log_file(log_dir: &Path, log_file: &str) -> Result<(), io::Error> {
    fs::create_dir_all(log_dir)?;
    fs::write(log_dir.join(log_file), "")
}

pub fn default_log_file() -> &'static str {
    DEFAULT_LOG_FILE
}
