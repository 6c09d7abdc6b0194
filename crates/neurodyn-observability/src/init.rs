// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unified logging initialization
//!
//! Installs a global `tracing` subscriber: a human-readable console layer
//! and, with the `file-logging` feature, a daily-rolling log file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use neurodyn_config::LoggingConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

/// Levels accepted as the default filter level
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Keeps background log writers alive; flushes on drop
#[derive(Debug)]
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Directory receiving log files, if file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Build the filter for `debug_flags` on top of `level`
pub fn build_filter(debug_flags: &CrateDebugFlags, level: &str) -> Result<EnvFilter> {
    if !LOG_LEVELS.contains(&level) {
        anyhow::bail!("unknown log level '{}' (expected one of {:?})", level, LOG_LEVELS);
    }
    let directives = debug_flags.to_filter_string(level);
    EnvFilter::try_new(&directives).with_context(|| format!("Invalid log filter: {}", directives))
}

/// Initialize console logging
pub fn init_logging(debug_flags: &CrateDebugFlags, level: &str) -> Result<LoggingGuard> {
    let env_filter = build_filter(debug_flags, level)?;
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_filter(env_filter);
    Registry::default()
        .with(console_layer)
        .try_init()
        .context("Failed to install the global tracing subscriber")?;
    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guard: None,
        log_dir: None,
    })
}

/// Initialize console logging plus a daily-rolling `neurodyn.log` in `log_dir`
#[cfg(feature = "file-logging")]
pub fn init_logging_with_file(debug_flags: &CrateDebugFlags, level: &str, log_dir: &Path) -> Result<LoggingGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(build_filter(debug_flags, level)?);

    let file_appender = tracing_appender::rolling::daily(log_dir, "neurodyn.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(build_filter(debug_flags, level)?);

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install the global tracing subscriber")?;

    Ok(LoggingGuard {
        _file_guard: Some(guard),
        log_dir: Some(log_dir.to_path_buf()),
    })
}

/// Initialize logging from the `[logging]` configuration section
pub fn init_from_config(debug_flags: &CrateDebugFlags, config: &LoggingConfig) -> Result<LoggingGuard> {
    #[cfg(feature = "file-logging")]
    if config.file_logging {
        return init_logging_with_file(debug_flags, &config.level, &config.log_dir);
    }
    #[cfg(not(feature = "file-logging"))]
    if config.file_logging {
        tracing::warn!("file logging requested but the `file-logging` feature is disabled");
    }
    init_logging(debug_flags, &config.level)
}
