//! In-process document collection
//!
//! Evaluates the same filter, sort and `$set` grammar as the SQLite backend.
//! Handy for tests and for crawls that do not need to survive a restart.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::document::{get_path, set_path};
use crate::domain::{
    Document, DocumentCollection, Filter, FindOptions, IndexModel, STORAGE_ID_FIELD, StoreError, StoreResult,
    UpdateOutcome,
};

static NEXT_COLLECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct MemoryState {
    documents: BTreeMap<i64, Document>,
    next_id: i64,
    indexes: Vec<String>,
    index_requests: usize,
}

#[derive(Debug)]
pub struct MemoryCollection {
    namespace: String,
    state: RwLock<MemoryState>,
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCollection {
    pub fn new() -> Self {
        let id = NEXT_COLLECTION_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            namespace: format!("memory#{id}"),
            state: RwLock::new(MemoryState {
                next_id: 1,
                ..MemoryState::default()
            }),
        }
    }

    /// How many times `create_indexes` has been called.
    pub async fn index_requests(&self) -> usize {
        self.state.read().await.index_requests
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn insert_one(&self, mut document: Document) -> StoreResult<Document> {
        let mut state = self.state.write().await;
        let id = match document.remove(STORAGE_ID_FIELD) {
            None => state.next_id,
            Some(Value::Number(number)) if number.is_i64() => number.as_i64().unwrap_or(state.next_id),
            Some(other) => {
                return Err(StoreError::invalid_document(format!("`_id` must be an integer, got {other}")));
            }
        };
        if state.documents.contains_key(&id) {
            return Err(StoreError::invalid_document(format!("duplicate `_id` {id}")));
        }
        let following = id
            .checked_add(1)
            .ok_or_else(|| StoreError::invalid_document(format!("`_id` {id} leaves no room for further ids")))?;

        document.insert(STORAGE_ID_FIELD.to_string(), Value::from(id));
        state.next_id = state.next_id.max(following);
        state.documents.insert(id, document.clone());
        Ok(document)
    }

    async fn find_one(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Option<Document>> {
        let state = self.state.read().await;
        // BTreeMap iteration is `_id` order, so `min_by` keeps the lowest id on ties.
        Ok(state
            .documents
            .values()
            .filter(|document| filter.matches(document))
            .min_by(|left, right| options.compare(left, right))
            .cloned())
    }

    async fn find(&self, filter: &Filter) -> StoreResult<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .values()
            .filter(|document| filter.matches(document))
            .cloned()
            .collect())
    }

    async fn count_documents(&self, filter: &Filter) -> StoreResult<u64> {
        let state = self.state.read().await;
        let count = state.documents.values().filter(|document| filter.matches(document)).count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn find_one_and_update(&self, filter: &Filter, set: &[(String, Value)]) -> StoreResult<UpdateOutcome> {
        let mut state = self.state.write().await;
        let Some(document) = state.documents.values_mut().find(|document| filter.matches(document)) else {
            return Ok(UpdateOutcome::default());
        };

        let mut updated = document.clone();
        for (path, value) in set {
            if path == STORAGE_ID_FIELD {
                return Err(StoreError::invalid_document("`_id` is immutable"));
            }
            if !set_path(&mut updated, path, value.clone()) {
                return Err(StoreError::invalid_document(format!(
                    "cannot create field `{path}` inside a non-object value"
                )));
            }
        }
        *document = updated.clone();

        Ok(UpdateOutcome {
            matched: 1,
            document: Some(updated),
        })
    }

    async fn create_indexes(&self, indexes: &[IndexModel]) -> StoreResult<Vec<String>> {
        let mut state = self.state.write().await;
        state.index_requests += 1;
        let names: Vec<String> = indexes.iter().map(IndexModel::name).collect();
        for name in &names {
            if !state.indexes.contains(name) {
                state.indexes.push(name.clone());
            }
        }
        Ok(names)
    }

    async fn list_indexes(&self) -> StoreResult<Vec<String>> {
        Ok(self.state.read().await.indexes.clone())
    }

    async fn average(&self, filter: &Filter, path: &str) -> StoreResult<Option<f64>> {
        let state = self.state.read().await;
        let values: Vec<f64> = state
            .documents
            .values()
            .filter(|document| filter.matches(document))
            .filter_map(|document| get_path(document, path).and_then(Value::as_f64))
            .collect();

        if values.is_empty() {
            return Ok(None);
        }
        #[allow(clippy::cast_precision_loss)]
        Ok(Some(values.iter().sum::<f64>() / values.len() as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IndexKind, SortOrder};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn assigns_ids_after_explicit_ones() {
        let collection = MemoryCollection::new();
        collection.insert_one(doc(json!({"_id": 5, "url": "a"}))).await.unwrap();
        let assigned = collection.insert_one(doc(json!({"url": "b"}))).await.unwrap();

        assert_eq!(assigned["_id"], json!(6));
        assert!(collection.insert_one(doc(json!({"_id": 5}))).await.is_err());
        assert_eq!(collection.len().await, 2);
    }

    #[tokio::test]
    async fn find_one_sorts_and_breaks_ties_by_id() {
        let collection = MemoryCollection::new();
        collection
            .insert_many(vec![
                doc(json!({"url": "a", "created": 20})),
                doc(json!({"url": "b", "created": 10})),
                doc(json!({"url": "c", "created": 10})),
            ])
            .await
            .unwrap();

        let ascending = FindOptions::sorted_by("created", SortOrder::Ascending);
        let first = collection.find_one(&Filter::new(), &ascending).await.unwrap().unwrap();
        assert_eq!(first["url"], json!("b"));

        let descending = FindOptions::sorted_by("created", SortOrder::Descending);
        let last = collection.find_one(&Filter::new(), &descending).await.unwrap().unwrap();
        assert_eq!(last["url"], json!("a"));
    }

    #[tokio::test]
    async fn update_reports_misses() {
        let collection = MemoryCollection::new();
        let outcome = collection
            .find_one_and_update(&Filter::new().equals("_id", 1), &[("status".into(), json!("downloaded"))])
            .await
            .unwrap();
        assert_eq!(outcome.matched, 0);
        assert!(outcome.document.is_none());
    }

    #[tokio::test]
    async fn update_through_a_scalar_is_rejected_without_writing() {
        let collection = MemoryCollection::new();
        collection.insert_one(doc(json!({"_id": 1, "depth": 1}))).await.unwrap();
        let by_id = Filter::new().equals("_id", 1);

        let error = collection
            .find_one_and_update(&by_id, &[("status".into(), json!("x")), ("depth.level".into(), json!(2))])
            .await
            .unwrap_err();
        assert!(matches!(error, StoreError::InvalidDocument(_)));

        let stored = collection.find_one(&by_id, &FindOptions::default()).await.unwrap().unwrap();
        assert_eq!(stored, doc(json!({"_id": 1, "depth": 1})));
    }

    #[tokio::test]
    async fn largest_id_is_rejected_instead_of_overflowing() {
        let collection = MemoryCollection::new();
        let error = collection.insert_one(doc(json!({"_id": i64::MAX}))).await.unwrap_err();
        assert!(matches!(error, StoreError::InvalidDocument(_)));
        assert!(collection.is_empty().await);

        collection.insert_one(doc(json!({"_id": i64::MAX - 1}))).await.unwrap();
        assert!(collection.insert_one(doc(json!({"url": "next"}))).await.is_err());
        assert_eq!(collection.len().await, 1);
    }

    #[tokio::test]
    async fn create_indexes_counts_requests() {
        let collection = MemoryCollection::new();
        let models = [IndexModel::new(&[("url", IndexKind::Hashed)])];
        collection.create_indexes(&models).await.unwrap();
        collection.create_indexes(&models).await.unwrap();

        assert_eq!(collection.index_requests().await, 2);
        assert_eq!(collection.list_indexes().await.unwrap(), vec!["url_hashed"]);
    }
}
