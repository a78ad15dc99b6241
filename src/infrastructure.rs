//! Infrastructure layer for document storage, configuration, and logging
//!
//! This module provides the SQLite connection pool, the two document
//! collection backends, layered configuration, and tracing setup.

pub mod config;
pub mod database_connection;
pub mod logging;
pub mod memory_collection;
pub mod sqlite_collection;

// Re-export commonly used items
pub use config::{DatabaseConfig, LoggingConfig, QueueConfig, QueueSettings};
pub use database_connection::DatabaseConnection;
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use memory_collection::MemoryCollection;
pub use sqlite_collection::SqliteCollection;
