//! Logging system configuration and initialization
//!
//! This module provides the logging setup for the engine:
//! - Console output with an env-filter driven level
//! - Optional rolling file output via a non-blocking writer
//! - Log files stored relative to the executable location by default

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::infrastructure::config::LoggingConfig;

// Global guard to keep the non-blocking log file writer alive
static LOG_GUARDS: Lazy<Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

/// Get the log directory relative to the executable location
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Initialize the logging system from a logging configuration.
///
/// `RUST_LOG` overrides the configured level when set. Safe to call once
/// per process; a second call returns an error from the subscriber
/// registry rather than silently reinstalling.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let console_layer = fmt::layer().with_target(true);

    if config.file_enabled {
        let log_dir = config
            .directory
            .clone()
            .unwrap_or_else(get_log_directory);
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = tracing_appender::rolling::daily(&log_dir, "leadflow.log");
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        if let Ok(mut guards) = LOG_GUARDS.lock() {
            guards.push(guard);
        }

        let file_layer = fmt::layer().with_ansi(false).with_writer(file_writer);

        Registry::default()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        info!("Logging initialized (console + file, dir: {:?})", log_dir);
    } else {
        Registry::default()
            .with(filter)
            .with(console_layer)
            .try_init()?;

        info!("Logging initialized (console only)");
    }

    Ok(())
}
