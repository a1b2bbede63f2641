//! Collection Management Tests
//!
//! - lazy creation by upsert
//! - idempotent drop
//! - listing strips the prefix

use crate::*;

#[test]
fn test_has_collection_before_and_after_upsert() {
    test_across_backends("has_collection", |layer| {
        assert!(!layer.has_collection("docs").unwrap());
        layer.upsert("docs", &pets()).unwrap();
        assert!(layer.has_collection("docs").unwrap());
    });
}

#[test]
fn test_has_collection_never_creates() {
    test_across_backends("has_never_creates", |layer| {
        assert!(!layer.has_collection("ghost").unwrap());
        assert!(!layer.has_collection("ghost").unwrap());
        assert!(layer.list_collections().unwrap().is_empty());
    });
}

#[test]
fn test_delete_collection_is_idempotent() {
    test_across_backends("delete_collection_idempotent", |layer| {
        layer.upsert("keep", &pets()).unwrap();

        layer.delete_collection("never_created").unwrap();
        layer.delete_collection("never_created").unwrap();

        assert!(layer.has_collection("keep").unwrap());
        assert_eq!(found(layer.get("keep")).len(), 2);
    });
}

#[test]
fn test_delete_collection_removes_items() {
    test_across_backends("delete_collection", |layer| {
        layer.upsert("docs", &pets()).unwrap();
        layer.delete_collection("docs").unwrap();
        assert!(!layer.has_collection("docs").unwrap());
        assert!(layer.get("docs").is_missing());
    });
}

#[test]
fn test_list_collections_sorted_logical_names() {
    test_across_backends("list_collections", |layer| {
        layer.upsert("zeta", &pets()).unwrap();
        layer.upsert("alpha", &pets()).unwrap();
        assert_eq!(layer.list_collections().unwrap(), vec!["alpha", "zeta"]);
    });
}

#[test]
fn test_collections_are_independent() {
    test_across_backends("independent_collections", |layer| {
        layer.upsert("one", &pets()).unwrap();
        layer.upsert("two", &circle(3, "shapes")).unwrap();
        assert_eq!(found(layer.get("one")).len(), 2);
        assert_eq!(found(layer.get("two")).len(), 3);
    });
}
