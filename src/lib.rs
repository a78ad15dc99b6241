//! Crawl Queue Store - persistent crawl queues over a shared document collection
//!
//! Each [`QueueStore`] is one named partition of a document collection. Items
//! are added with duplicate detection, looked up and patched by id, and
//! aggregated for fetch statistics. Two collection backends are provided:
//! SQLite with JSON1 expressions and an in-process map.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export the main types for easier access
pub use application::{QueueStore, QueueSummary, StatisticSummary};
pub use domain::{
    Document, DocumentCollection, ErrorKind, ItemId, NewQueueItem, QueueError, QueueItem, QueueResult, Statistic,
    StoreError,
};
pub use infrastructure::{DatabaseConnection, MemoryCollection, QueueConfig, SqliteCollection};
