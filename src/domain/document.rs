//! Document helpers shared by the queue store and the collection backends
//!
//! Documents are plain JSON objects. The storage layer keeps its identifier
//! under `_id`; everything handed back to callers goes through [`MapId`] so the
//! identifier shows up as `id` instead.

use serde_json::{Map, Value};

/// A schemaless JSON document as stored in a collection.
pub type Document = Map<String, Value>;

/// Identifier field used inside the collection.
pub const STORAGE_ID_FIELD: &str = "_id";

/// Identifier field exposed to callers.
pub const PUBLIC_ID_FIELD: &str = "id";

/// Projection from the storage identifier to the caller-facing one.
///
/// Works the same for a single document, an optional document and a
/// sequence of documents, so callers never need to special-case the shape of
/// a query result.
pub trait MapId: Sized {
    #[must_use]
    fn map_id(self) -> Self;
}

impl MapId for Document {
    fn map_id(mut self) -> Self {
        if let Some(id) = self.remove(STORAGE_ID_FIELD) {
            self.insert(PUBLIC_ID_FIELD.to_string(), id);
        }
        self
    }
}

impl<T: MapId> MapId for Option<T> {
    fn map_id(self) -> Self {
        self.map(MapId::map_id)
    }
}

impl<T: MapId> MapId for Vec<T> {
    fn map_id(self) -> Self {
        self.into_iter().map(MapId::map_id).collect()
    }
}

/// Flatten a patch into dotted `$set` paths.
///
/// Nested objects merge key by key; arrays and scalars replace the stored
/// value. An empty nested object contributes no path.
pub fn flatten_patch(patch: &Document) -> Vec<(String, Value)> {
    let mut paths = Vec::new();
    flatten_into(None, patch, &mut paths);
    paths
}

fn flatten_into(prefix: Option<&str>, object: &Document, out: &mut Vec<(String, Value)>) {
    for (key, value) in object {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) => flatten_into(Some(&path), nested, out),
            other => out.push((path, other.clone())),
        }
    }
}

/// Resolve a dotted path inside a document.
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = document.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write `value` at a dotted path, creating intermediate objects as needed.
///
/// Returns `false` without touching the document when an intermediate value
/// exists but is not an object.
pub fn set_path(document: &mut Document, path: &str, value: Value) -> bool {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut current = document;
    for segment in parents {
        let entry = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match entry {
            Value::Object(next) => current = next,
            _ => return false,
        }
    }
    current.insert((*last).to_string(), value);
    true
}
