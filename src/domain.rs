//! Domain module - queue entities, document helpers and the collection boundary
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod document;
pub mod errors;
pub mod filter;
pub mod queue_item;
pub mod repositories;

pub use document::{Document, MapId, PUBLIC_ID_FIELD, STORAGE_ID_FIELD, flatten_patch};
pub use errors::{ErrorKind, QueueError, QueueResult, StoreError, StoreResult};
pub use filter::{Condition, Filter, FindOptions, IndexKind, IndexModel, SortOrder};
pub use queue_item::{ItemId, NewQueueItem, QueueItem, STATUS_QUEUED, Statistic, check_patch_paths};
pub use repositories::{DocumentCollection, UpdateOutcome};
