//! # Logging Setup
//!
//! Log lines go to stdout and to an hourly rotated file in the configured
//! directory. `RUST_LOG` directives are honoured on top of the base level.

use std::fs;
use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{BridgeError, Result};

/// Rotated log files kept besides the current one
pub const MAX_LOG_FILES: usize = 5;

/// Base level: DEBUG with `debug` set, INFO otherwise
pub fn level(config: &LoggingConfig) -> Level {
    if config.debug {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Create the hourly rotated log file appender
///
/// # Errors
///
/// Returns error if the log directory cannot be created or the log file
/// cannot be opened.
pub fn file_appender(config: &LoggingConfig) -> Result<RollingFileAppender> {
    let dir = Path::new(&config.dir);
    fs::create_dir_all(dir)?;

    RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(config.file.as_str())
        .max_log_files(MAX_LOG_FILES + 1)
        .build(dir)
        .map_err(|e| BridgeError::Logging(format!("cannot open log file in {}: {}", config.dir, e)))
}

/// Install the global subscriber
///
/// # Returns
///
/// * `Result<WorkerGuard>` - Keeps the file writer flushing; hold it for the
///   lifetime of the program
///
/// # Errors
///
/// Returns error if the log file cannot be opened or a subscriber is
/// already installed.
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard> {
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender(config)?);

    let filter = EnvFilter::from_default_env().add_directive(level(config).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .map_err(|e| BridgeError::Logging(e.to_string()))?;

    Ok(guard)
}
