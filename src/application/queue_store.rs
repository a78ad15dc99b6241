//! Named crawl queue on top of a shared document collection
//!
//! Several queues can live in one collection; every read and write is scoped
//! by the `queueName` partition label. Documents leave the store normalized,
//! with the storage identifier exposed as `id`.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use super::index_guard::IndexGuard;
use crate::domain::{
    Document, DocumentCollection, Filter, FindOptions, ItemId, MapId, NewQueueItem, PUBLIC_ID_FIELD, QueueError,
    QueueItem, QueueResult, STATUS_QUEUED, STORAGE_ID_FIELD, SortOrder, Statistic, check_patch_paths, flatten_patch,
};

/// Alphabet of generated queue names; URL-safe.
const NAME_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_-";
const GENERATED_NAME_LEN: usize = 9;

/// Patch keys that never reach the collection.
const IMMUTABLE_FIELDS: [&str; 4] = [PUBLIC_ID_FIELD, STORAGE_ID_FIELD, "queueName", "created"];

/// Generate a short, URL-safe queue name.
pub fn generate_queue_name() -> String {
    (0..GENERATED_NAME_LEN)
        .map(|_| char::from(NAME_ALPHABET[fastrand::usize(..NAME_ALPHABET.len())]))
        .collect()
}

/// Whether `name` looks like a token produced by [`generate_queue_name`].
pub fn is_valid_generated_name(name: &str) -> bool {
    name.len() == GENERATED_NAME_LEN && name.bytes().all(|byte| NAME_ALPHABET.contains(&byte))
}

#[derive(Clone)]
pub struct QueueStore {
    collection: Arc<dyn DocumentCollection>,
    name: String,
    indexes: IndexGuard,
}

impl std::fmt::Debug for QueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStore")
            .field("namespace", &self.collection.namespace())
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl QueueStore {
    /// Build a queue over `collection`. Without a name one is generated.
    pub fn new(collection: Arc<dyn DocumentCollection>, name: Option<&str>) -> QueueResult<Self> {
        let name = match name {
            Some("") => return Err(QueueError::invalid_argument("`name` param should be a non-empty string")),
            Some(name) => name.to_string(),
            None => generate_queue_name(),
        };
        let indexes = IndexGuard::for_namespace(collection.namespace());
        Ok(Self { collection, name, indexes })
    }

    /// Like [`QueueStore::new`], but creates the supporting indexes up front.
    pub async fn create(collection: Arc<dyn DocumentCollection>, name: Option<&str>) -> QueueResult<Self> {
        let store = Self::new(collection, name)?;
        store.ensure_indexes().await?;
        Ok(store)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &Arc<dyn DocumentCollection> {
        &self.collection
    }

    pub async fn ensure_indexes(&self) -> QueueResult<()> {
        self.indexes.ensure(self.collection.as_ref()).await?;
        Ok(())
    }

    fn partition(&self) -> Filter {
        Filter::new().equals("queueName", self.name.as_str())
    }

    /// Partition clause conjoined with a caller filter; `id` means `_id`.
    fn scoped(&self, comparator: &Document) -> QueueResult<Filter> {
        let mut comparator = comparator.clone();
        if let Some(id) = comparator.remove(PUBLIC_ID_FIELD) {
            comparator.insert(STORAGE_ID_FIELD.to_string(), id);
        }
        Ok(self.partition().and(Filter::from_document(&comparator)?))
    }

    fn by_id(&self, id: ItemId) -> Filter {
        self.partition().equals(STORAGE_ID_FIELD, id.0)
    }

    fn into_item(document: Document) -> QueueResult<QueueItem> {
        Ok(serde_json::from_value(Value::Object(document.map_id()))?)
    }

    fn into_items(documents: Vec<Document>) -> QueueResult<Vec<QueueItem>> {
        documents.into_iter().map(Self::into_item).collect()
    }

    /// Add an item. Fails with `Duplicate` if the url is already queued in
    /// this partition, unless `force` is set.
    ///
    /// The existence check and the insert are two separate collection calls.
    pub async fn add(&self, item: NewQueueItem, force: bool) -> QueueResult<QueueItem> {
        self.ensure_indexes().await?;
        let url = item.url.clone();
        if !force && self.exists(&url).await? {
            warn!("Rejected duplicate url {} in queue {}", url, self.name);
            return Err(QueueError::Duplicate { url });
        }

        let document = item.into_document(&self.name, Utc::now())?;
        let inserted = self.collection.insert_one(document).await?;
        debug!("Queued {} in {}", url, self.name);
        Self::into_item(inserted)
    }

    pub async fn exists(&self, url: &str) -> QueueResult<bool> {
        self.ensure_indexes().await?;
        let filter = self.partition().equals("url", url);
        Ok(self.collection.count_documents(&filter).await? > 0)
    }

    /// Fetch an item of this partition by id.
    pub async fn get_by_id(&self, id: ItemId) -> QueueResult<QueueItem> {
        self.ensure_indexes().await?;
        let found = self.collection.find_one(&self.by_id(id), &FindOptions::default()).await?;
        match found {
            Some(document) => Self::into_item(document),
            None => Err(QueueError::NotFound { id }),
        }
    }

    /// Older name of [`QueueStore::get_by_id`].
    pub async fn get(&self, id: ItemId) -> QueueResult<QueueItem> {
        self.get_by_id(id).await
    }

    /// Deep-merge `patch` into the item and return the stored result.
    ///
    /// `id`, `queueName` and `created` are ignored if present in the patch.
    /// A patch that would retype `stateData`, `status`, `url` or `fetched`
    /// fails with `InvalidArgument` and writes nothing.
    pub async fn update(&self, id: ItemId, patch: &Document) -> QueueResult<QueueItem> {
        let mut patch = patch.clone();
        for field in IMMUTABLE_FIELDS {
            patch.remove(field);
        }
        let set = flatten_patch(&patch);
        check_patch_paths(&set)?;

        self.ensure_indexes().await?;
        let outcome = self.collection.find_one_and_update(&self.by_id(id), &set).await?;
        match outcome.document {
            Some(document) if outcome.matched > 0 => {
                debug!("Updated {} field(s) of item {} in {}", set.len(), id, self.name);
                Self::into_item(document)
            }
            _ => Err(QueueError::NotFound { id }),
        }
    }

    /// The queued item with the earliest `created` timestamp, if any.
    pub async fn oldest_unfetched_item(&self) -> QueueResult<Option<QueueItem>> {
        self.ensure_indexes().await?;
        let filter = self.partition().equals("status", STATUS_QUEUED);
        let options = FindOptions::sorted_by("created", SortOrder::Ascending);
        self.collection
            .find_one(&filter, &options)
            .await?
            .map(Self::into_item)
            .transpose()
    }

    pub async fn count_items(&self, comparator: &Document) -> QueueResult<u64> {
        self.ensure_indexes().await?;
        let filter = self.scoped(comparator)?;
        Ok(self.collection.count_documents(&filter).await?)
    }

    pub async fn filter_items(&self, comparator: &Document) -> QueueResult<Vec<QueueItem>> {
        self.ensure_indexes().await?;
        let filter = self.scoped(comparator)?;
        Self::into_items(self.collection.find(&filter).await?)
    }

    pub async fn get_length(&self) -> QueueResult<u64> {
        self.count_items(&Document::new()).await
    }

    fn fetched_with(&self, statistic: Statistic) -> Filter {
        self.partition().equals("fetched", true).exists(statistic.field_path())
    }

    async fn extreme(&self, statistic_name: &str, order: SortOrder) -> QueueResult<Option<f64>> {
        let statistic: Statistic = statistic_name.parse()?;
        self.ensure_indexes().await?;
        let options = FindOptions::sorted_by(statistic.field_path(), order);
        let found = self.collection.find_one(&self.fetched_with(statistic), &options).await?;
        Ok(found
            .and_then(|document| document.get("stateData").cloned())
            .and_then(|state| state.get(statistic.as_str()).and_then(Value::as_f64)))
    }

    /// Largest recorded value of a fetch statistic over fetched items.
    pub async fn max(&self, statistic_name: &str) -> QueueResult<Option<f64>> {
        self.extreme(statistic_name, SortOrder::Descending).await
    }

    /// Smallest recorded value of a fetch statistic over fetched items.
    pub async fn min(&self, statistic_name: &str) -> QueueResult<Option<f64>> {
        self.extreme(statistic_name, SortOrder::Ascending).await
    }

    /// Mean of a fetch statistic over fetched items.
    pub async fn avg(&self, statistic_name: &str) -> QueueResult<Option<f64>> {
        let statistic: Statistic = statistic_name.parse()?;
        self.ensure_indexes().await?;
        Ok(self
            .collection
            .average(&self.fetched_with(statistic), &statistic.field_path())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_are_valid_tokens() {
        for _ in 0..100 {
            let name = generate_queue_name();
            assert!(is_valid_generated_name(&name), "{name}");
        }
        assert!(!is_valid_generated_name("has space"));
        assert!(!is_valid_generated_name("short"));
    }
}
