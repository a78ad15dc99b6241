//! Logging system configuration and initialization
//!
//! This module provides the logging setup with:
//! - Console and/or file output
//! - Daily rotated log files written through a non-blocking appender
//! - Configuration based log level control, overridable with `RUST_LOG`
//! - Structured JSON logging (optional)

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use lazy_static::lazy_static;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use super::config::LoggingConfig;
use super::config::data_directory;

const LOG_FILE_PREFIX: &str = "crawl-queue.log";

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// Directory for log files when the configuration does not name one.
pub fn get_log_directory() -> PathBuf {
    data_directory().join("logs")
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Filter for the configured level, with dependency noise suppressed.
///
/// `RUST_LOG` wins when set:
/// ```bash
/// RUST_LOG="debug,sqlx::query=debug" crawl-queue
/// ```
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level).map_err(|e| anyhow!("Invalid log level {}: {}", config.level, e))?;

    // Suppress verbose SQL logs unless TRACE level is specifically requested
    if !config.level.to_lowercase().contains("trace") {
        for directive in ["sqlx::query=warn", "sqlx::sqlite=warn", "tokio=info"] {
            filter = filter.add_directive(directive.parse()?);
        }
        filter = filter.add_directive(format!("crawl_queue_store={}", config.level).parse()?);
    }

    Ok(filter)
}

/// Initialize logging with custom configuration
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config)?;

    let console_layer = config.console_output.then(|| {
        let layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
        if config.json_format { layer.json().boxed() } else { layer.boxed() }
    });

    let file_layer = if config.file_output {
        let log_dir = config.log_dir.clone().unwrap_or_else(get_log_directory);
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {}: {}", log_dir.display(), e))?;

        let (file_writer, file_guard) = non_blocking(rolling::daily(&log_dir, LOG_FILE_PREFIX));
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(file_guard);

        let layer = fmt::layer().with_writer(file_writer).with_ansi(false);
        Some(if config.json_format {
            layer.json().with_thread_ids(true).with_file(true).with_line_number(true).boxed()
        } else {
            layer.with_target(false).boxed()
        })
    } else {
        None
    };

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!("Logging initialized at level {}", config.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_accepts_configured_level() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            ..LoggingConfig::default()
        };
        assert!(build_env_filter(&config).is_ok());
    }

    #[test]
    fn log_directory_is_under_data_directory() {
        assert!(get_log_directory().starts_with(data_directory()));
        assert!(get_log_directory().ends_with("logs"));
    }
}
