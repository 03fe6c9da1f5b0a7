// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Tracing subscriber setup

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::{CompanionError, Result};

/// Log files are `<dir>/server.<date>.log`
pub const LOG_PREFIX: &str = "server";
pub const LOG_SUFFIX: &str = "log";

/// Pick the default filter from the verbosity flags. `--trace` wins over
/// `-v`, which wins over `-q`.
pub fn level_for(verbose: bool, trace: bool, quiet: bool) -> &'static str {
    if trace {
        "trace"
    } else if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}

/// Daily-rotated appender keeping the newest `max_files` logs
fn file_appender(config: &LoggingConfig) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(&config.dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix(LOG_SUFFIX)
        .max_log_files(config.max_files.max(1))
        .build(&config.dir)
        .map_err(|e| CompanionError::Config(format!("Cannot open log in {:?}: {}", config.dir, e)))
}

/// Install the global subscriber: a console layer on stderr, plus JSON lines
/// in rotated files under `config.dir` when enabled. `RUST_LOG` overrides
/// `level`.
///
/// The returned guard flushes the file writer on drop; hold it for the life
/// of the process.
pub fn init(level: &str, config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = if config.file {
        let (writer, guard) = tracing_appender::non_blocking(file_appender(config)?);
        (Some(fmt::layer().json().with_writer(writer)), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| CompanionError::Config(format!("Cannot install logger: {}", e)))?;

    Ok(guard)
}
