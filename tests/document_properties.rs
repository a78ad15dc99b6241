//! Property tests for document normalization and patch flattening

use crawl_queue_store::domain::document::get_path;
use crawl_queue_store::domain::{Document, MapId, Statistic, flatten_patch};
use proptest::prelude::*;
use serde_json::{Value, json};

fn field_name() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z]{0,7}".prop_filter("reserved", |name| name != "id")
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,12}".prop_map(Value::from),
        Just(Value::Null),
    ]
}

fn nested_document() -> impl Strategy<Value = Document> {
    let leaf = prop::collection::btree_map(field_name(), scalar(), 0..4)
        .prop_map(|map| map.into_iter().collect::<Document>());
    prop::collection::btree_map(
        field_name(),
        prop_oneof![scalar(), leaf.prop_map(Value::Object)],
        0..5,
    )
    .prop_map(|map| map.into_iter().collect::<Document>())
}

proptest! {
    #[test]
    fn map_id_moves_storage_id(id in any::<i64>(), document in nested_document()) {
        let mut stored = document.clone();
        stored.insert("_id".into(), json!(id));

        let mapped = stored.map_id();

        prop_assert_eq!(mapped.get("id"), Some(&json!(id)));
        prop_assert!(!mapped.contains_key("_id"));
        prop_assert_eq!(mapped.len(), document.len() + 1);
        for (key, value) in &document {
            prop_assert_eq!(mapped.get(key), Some(value));
        }
    }

    #[test]
    fn map_id_is_shape_preserving(documents in prop::collection::vec(nested_document(), 0..6)) {
        let stored: Vec<Document> = documents
            .iter()
            .enumerate()
            .map(|(n, document)| {
                let mut document = document.clone();
                document.insert("_id".into(), json!(n));
                document
            })
            .collect();

        let mapped = stored.clone().map_id();
        prop_assert_eq!(mapped.len(), stored.len());
        prop_assert_eq!(stored.first().cloned().map_id(), mapped.first().cloned());
    }

    #[test]
    fn flattened_paths_resolve_to_leaf_values(patch in nested_document()) {
        for (path, value) in flatten_patch(&patch) {
            prop_assert!(!value.is_object());
            prop_assert_eq!(get_path(&patch, &path), Some(&value));
        }
    }

    #[test]
    fn unknown_statistic_names_are_rejected(name in "[a-zA-Z]{1,16}") {
        let known = Statistic::ALL.iter().any(|statistic| statistic.as_str() == name);
        prop_assert_eq!(name.parse::<Statistic>().is_ok(), known);
    }
}
