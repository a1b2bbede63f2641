//! Search Tests
//!
//! - nearest item ranks first
//! - one row per query vector
//! - limits and the unlimited default

use crate::*;

#[test]
fn test_nearest_item_first() {
    test_across_backends("search_nearest", |layer| {
        layer.upsert("docs", &pets()).unwrap();
        let result = found(layer.search("docs", &[vec![0.0, 1.0]], Some(1)));
        assert_eq!(result.rows(), 1);
        assert_eq!(result.first_ids().len(), 1);
        assert!(result.first_ids()[0].matches(&id("a")));
        assert_eq!(result.documents[0][0], "cat");
    });
}

#[test]
fn test_one_row_per_query_vector() {
    test_across_backends("search_batch", |layer| {
        layer.upsert("docs", &pets()).unwrap();
        let result = found(layer.search("docs", &[vec![0.0, 1.0], vec![1.0, 0.0]], Some(1)));
        assert_eq!(result.rows(), 2);
        assert!(result.ids[0][0].matches(&id("a")));
        assert!(result.ids[1][0].matches(&id("b")));
    });
}

#[test]
fn test_unlimited_search_returns_everything() {
    test_across_backends("search_unlimited", |layer| {
        layer.upsert("docs", &circle(5, "shapes")).unwrap();
        let none = found(layer.search("docs", &[vec![1.0, 0.0]], None));
        let zero = found(layer.search("docs", &[vec![1.0, 0.0]], Some(0)));
        assert_eq!(none.first_ids().len(), 5);
        assert_eq!(zero.first_ids().len(), 5);
    });
}

#[test]
fn test_limit_caps_row_length() {
    test_across_backends("search_limit", |layer| {
        layer.upsert("docs", &circle(5, "shapes")).unwrap();
        let result = found(layer.search("docs", &[vec![1.0, 0.0]], Some(3)));
        assert_eq!(result.first_ids().len(), 3);
        assert!(result.first_ids()[0].matches(&id("shapes-0")));
    });
}

#[test]
fn test_hits_carry_text_and_metadata() {
    test_across_backends("search_hits", |layer| {
        layer.upsert("docs", &pets()).unwrap();
        let result = found(layer.search("docs", &[vec![1.0, 0.0]], Some(2)));
        let hits: Vec<_> = result.hits(0).collect();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document, "dog");
        assert_eq!(hits[0].metadata.get("topic"), Some(&json!("pets")));
    });
}

#[test]
fn test_search_missing_collection() {
    test_across_backends("search_missing", |layer| {
        assert!(layer.search("absent", &[vec![1.0, 0.0]], Some(1)).is_missing());
    });
}

#[test]
fn test_memory_distances_ascend() {
    let layer = VectorLayer::ephemeral();
    layer.upsert("docs", &circle(4, "shapes")).unwrap();
    let result = found(layer.search("docs", &[vec![1.0, 0.0]], None));
    let distances = &result.distances[0];
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    assert!(distances[0].abs() < 1e-6);
}
