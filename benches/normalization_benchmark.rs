//! Document normalization and query benchmarks
//!
//! - `map_id` over result sets of growing size
//! - `flatten_patch` for a typical fetch-completion patch
//! - `get_length` and `oldest_unfetched_item` against the in-process backend

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use crawl_queue_store::domain::{Document, DocumentCollection, MapId, flatten_patch};
use crawl_queue_store::{MemoryCollection, QueueStore};
use serde_json::json;
use tokio::runtime::Runtime;

fn stored_document(id: i64) -> Document {
    match json!({
        "_id": id,
        "url": format!("http://example.com/{id}"),
        "queueName": "bench",
        "status": if id % 2 == 0 { "queued" } else { "downloaded" },
        "created": 1_700_000_000_000_i64 + id,
        "fetched": id % 2 != 0,
        "stateData": {"contentLength": id * 10, "headers": {"server": "nginx"}}
    }) {
        serde_json::Value::Object(document) => document,
        _ => Document::new(),
    }
}

fn bench_map_id(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_id");
    for size in [1_usize, 100, 1_000] {
        let documents: Vec<Document> = (0..size as i64).map(stored_document).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &documents, |b, documents| {
            b.iter(|| black_box(documents.clone().map_id()));
        });
    }
    group.finish();
}

fn bench_flatten_patch(c: &mut Criterion) {
    let patch = match json!({
        "status": "downloaded",
        "fetched": true,
        "stateData": {
            "contentLength": 5120,
            "downloadTime": 42,
            "requestLatency": 12,
            "headers": {"content-type": "text/html", "server": "nginx"}
        }
    }) {
        serde_json::Value::Object(patch) => patch,
        _ => Document::new(),
    };

    c.bench_function("flatten_patch", |b| b.iter(|| black_box(flatten_patch(black_box(&patch)))));
}

fn bench_memory_queries(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = rt.block_on(async {
        let collection = Arc::new(MemoryCollection::new());
        collection.insert_many((1..=1_000).map(stored_document).collect()).await.unwrap();
        QueueStore::create(collection, Some("bench")).await.unwrap()
    });

    c.bench_function("get_length_1000", |b| {
        b.iter(|| rt.block_on(async { black_box(store.get_length().await.unwrap()) }));
    });
    c.bench_function("oldest_unfetched_item_1000", |b| {
        b.iter(|| rt.block_on(async { black_box(store.oldest_unfetched_item().await.unwrap()) }));
    });
}

criterion_group!(benches, bench_map_id, bench_flatten_patch, bench_memory_queries);
criterion_main!(benches);
