//! Application layer module
//!
//! The queue store facade and the reports built on top of it.

pub mod index_guard;
pub mod queue_store;
pub mod summary;

pub use index_guard::{IndexGuard, supporting_indexes};
pub use queue_store::{QueueStore, generate_queue_name, is_valid_generated_name};
pub use summary::{QueueSummary, StatisticSummary};
