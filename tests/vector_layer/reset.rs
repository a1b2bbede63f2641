//! Reset Tests
//!
//! Reset drops every collection under the layer's prefix and nothing else.

use crate::*;
use std::sync::Arc;
use veclayer_backends::{MemoryStore, MemoryVectorDb};

#[test]
fn test_reset_removes_prefixed_collections() {
    test_across_backends("reset", |layer| {
        layer.upsert("one", &pets()).unwrap();
        layer.upsert("two", &pets()).unwrap();
        layer.reset().unwrap();
        assert!(layer.list_collections().unwrap().is_empty());
        assert!(!layer.has_collection("one").unwrap());
    });
}

#[test]
fn test_reset_on_empty_store() {
    test_across_backends("reset_empty", |layer| {
        layer.reset().unwrap();
        layer.reset().unwrap();
    });
}

#[test]
fn test_reset_leaves_foreign_collections() {
    let store = Arc::new(MemoryStore::new());
    let ours = VectorLayer::from_backend(Arc::new(MemoryVectorDb::with_shared_store(
        "ours",
        Arc::clone(&store),
    )));
    let theirs = VectorLayer::from_backend(Arc::new(MemoryVectorDb::with_shared_store(
        "theirs",
        Arc::clone(&store),
    )));

    ours.upsert("docs", &pets()).unwrap();
    theirs.upsert("docs", &pets()).unwrap();
    ours.reset().unwrap();

    assert_eq!(store.raw_collection_names(), vec!["theirs_docs".to_string()]);
    assert!(theirs.has_collection("docs").unwrap());
}

#[test]
fn test_similar_prefix_is_not_owned() {
    let store = Arc::new(MemoryStore::new());
    let short = VectorLayer::from_backend(Arc::new(MemoryVectorDb::with_shared_store(
        "app",
        Arc::clone(&store),
    )));
    let long = VectorLayer::from_backend(Arc::new(MemoryVectorDb::with_shared_store(
        "appx",
        Arc::clone(&store),
    )));

    long.upsert("docs", &pets()).unwrap();
    assert!(short.list_collections().unwrap().is_empty());
    short.reset().unwrap();
    assert!(long.has_collection("docs").unwrap());
}
