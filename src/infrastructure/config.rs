//! Configuration infrastructure
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `CRAWL_QUEUE__*` environment variables (`CRAWL_QUEUE__QUEUE__NAME=example`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "CRAWL_QUEUE";

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub database: DatabaseConfig,
    pub queue: QueueSettings,
    pub logging: LoggingConfig,
}

/// Where queue documents are stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite://crawl-queue.db`
    pub url: String,

    /// Collection shared by every queue partition
    pub collection: String,

    /// Pool size; forced to 1 for in-memory databases
    pub max_connections: u32,
}

/// Queue partition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Partition label; generated when absent
    pub name: Option<String>,

    /// Create supporting indexes at startup instead of on first query
    pub ensure_indexes_on_start: bool,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files; defaults to the platform data directory
    pub log_dir: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            collection: "queue".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            name: None,
            ensure_indexes_on_start: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
        }
    }
}

/// Directory holding the default database and log files.
pub fn data_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default())
        .join("crawl-queue")
}

fn default_database_url() -> String {
    format!("sqlite://{}", data_directory().join("crawl-queue.db").display())
}

impl QueueConfig {
    /// Load defaults, then `path` if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&Self::default()).context("Failed to serialize default configuration")?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("__").separator("__"))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.collection.trim().is_empty() {
            anyhow::bail!("database.collection must not be empty");
        }
        if matches!(self.queue.name.as_deref(), Some("")) {
            anyhow::bail!("queue.name must not be empty when set");
        }
        Ok(())
    }
}
