//! Collection interface consumed by the queue store
//!
//! Any document store that can insert, find, count, patch atomically, build
//! indexes and average a field can back a crawl queue.

use async_trait::async_trait;
use serde_json::Value;

use super::document::Document;
use super::errors::StoreResult;
use super::filter::{Filter, FindOptions, IndexModel};

/// Result of an atomic find-and-update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    /// Number of documents the filter matched (0 or 1).
    pub matched: u64,
    /// The document after the update was applied.
    pub document: Option<Document>,
}

#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Identity of the underlying shared collection. Handles that point at the
    /// same collection report the same namespace.
    fn namespace(&self) -> &str;

    /// Insert a document; an integer `_id` is kept, otherwise one is assigned.
    async fn insert_one(&self, document: Document) -> StoreResult<Document>;

    async fn insert_many(&self, documents: Vec<Document>) -> StoreResult<Vec<Document>> {
        let mut inserted = Vec::with_capacity(documents.len());
        for document in documents {
            inserted.push(self.insert_one(document).await?);
        }
        Ok(inserted)
    }

    async fn find_one(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Option<Document>>;

    async fn find(&self, filter: &Filter) -> StoreResult<Vec<Document>>;

    async fn count_documents(&self, filter: &Filter) -> StoreResult<u64>;

    /// Apply dotted-path assignments to the first match, atomically.
    async fn find_one_and_update(&self, filter: &Filter, set: &[(String, Value)]) -> StoreResult<UpdateOutcome>;

    /// Ensure the given indexes exist; returns their names.
    async fn create_indexes(&self, indexes: &[IndexModel]) -> StoreResult<Vec<String>>;

    async fn list_indexes(&self) -> StoreResult<Vec<String>>;

    /// Mean of the numeric values at `path` across matches; `None` when nothing matched.
    async fn average(&self, filter: &Filter, path: &str) -> StoreResult<Option<f64>>;
}
