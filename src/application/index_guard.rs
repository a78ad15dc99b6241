//! One-time creation of the supporting indexes
//!
//! Guards are shared process-wide per collection namespace, so every
//! `QueueStore` over the same collection waits on the same initialization.
//! A failed attempt leaves the cell empty and the next caller retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::domain::{DocumentCollection, IndexKind, IndexModel, StoreError, StoreResult};

static INDEX_GUARDS: Lazy<Mutex<HashMap<String, Arc<OnceCell<()>>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Compound (partition, status, created) index plus a hashed url index.
pub fn supporting_indexes() -> Vec<IndexModel> {
    vec![
        IndexModel::new(&[
            ("queueName", IndexKind::Ascending),
            ("status", IndexKind::Ascending),
            ("created", IndexKind::Ascending),
        ]),
        IndexModel::new(&[("url", IndexKind::Hashed)]),
    ]
}

#[derive(Debug, Clone)]
pub struct IndexGuard {
    cell: Arc<OnceCell<()>>,
}

impl IndexGuard {
    /// Guard shared by every caller using the same collection namespace.
    pub fn for_namespace(namespace: &str) -> Self {
        let mut guards = INDEX_GUARDS.lock().unwrap_or_else(PoisonError::into_inner);
        let cell = guards.entry(namespace.to_string()).or_default().clone();
        Self { cell }
    }

    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn ensure(&self, collection: &dyn DocumentCollection) -> StoreResult<()> {
        if self.cell.initialized() {
            return Ok(());
        }
        self.cell
            .get_or_try_init(|| async {
                debug!("Creating supporting indexes on {}", collection.namespace());
                let names = collection.create_indexes(&supporting_indexes()).await?;
                info!("Supporting indexes ready on {}: {:?}", collection.namespace(), names);
                Ok::<(), StoreError>(())
            })
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_are_shared_per_namespace() {
        let first = IndexGuard::for_namespace("index-guard-test#1");
        let second = IndexGuard::for_namespace("index-guard-test#1");
        let other = IndexGuard::for_namespace("index-guard-test#2");

        assert!(Arc::ptr_eq(&first.cell, &second.cell));
        assert!(!Arc::ptr_eq(&first.cell, &other.cell));
        assert!(!first.is_ready());
    }

    #[test]
    fn supporting_index_names() {
        let names: Vec<String> = supporting_indexes().iter().map(IndexModel::name).collect();
        assert_eq!(names, vec!["queueName_1_status_1_created_1", "url_hashed"]);
    }
}
