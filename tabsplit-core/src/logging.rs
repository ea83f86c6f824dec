//! Logging for tabsplit
//!
//! The CLI prints results on stdout, so diagnostics go to a daily-rotated
//! file under `$XDG_STATE_HOME/tabsplit/` instead.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};

/// Log file name prefix; rotation appends the date
const LOG_FILE_PREFIX: &str = "tabsplit.log";

/// Keeps the background log writer alive; pending lines flush on drop.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Install the global subscriber writing to the XDG state directory.
///
/// `RUST_LOG` overrides `config.level` when set.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    init_in(&Config::state_dir(), config)
}

fn init_in(log_dir: &Path, config: &LoggingConfig) -> Result<LoggingGuard> {
    std::fs::create_dir_all(log_dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(log_dir)
        .map_err(|e| Error::Config(format!("cannot open log file in {}: {}", log_dir.display(), e)))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::Config(format!("invalid log level '{}': {}", config.level, e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!(log_dir = %log_dir.display(), level = %config.level, "Logging initialized");

    Ok(LoggingGuard { _guard: guard })
}

/// Route logs to the test harness output. Safe to call repeatedly.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
