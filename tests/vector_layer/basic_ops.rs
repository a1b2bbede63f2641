//! Basic Operations Tests
//!
//! - upsert then get returns every item intact
//! - upsert replaces existing ids
//! - insert behaves like upsert
//! - input validation

use crate::*;

#[test]
fn test_upsert_then_get_round_trips() {
    test_across_backends("upsert_then_get", |layer| {
        layer.upsert("docs", &pets()).unwrap();

        let result = found(layer.get("docs"));
        assert_eq!(result.len(), 2);
        let mut expected = vec![id("a"), id("b")];
        expected.sort();
        assert_eq!(sorted_ids(&result), expected);

        for (point, text, metadata) in result.iter() {
            let want = if point.matches(&id("a")) { "cat" } else { "dog" };
            assert_eq!(text, want);
            assert_eq!(metadata.get("topic"), Some(&json!("pets")));
        }
    });
}

#[test]
fn test_upsert_replaces_existing_id() {
    test_across_backends("upsert_replaces", |layer| {
        layer.upsert("docs", &pets()).unwrap();
        let replacement =
            VectorItem::new(id("a"), vec![0.0, 1.0], "kitten").with_metadata("topic", "young");
        layer.upsert("docs", &[replacement]).unwrap();

        let result = found(layer.get("docs"));
        assert_eq!(result.len(), 2);
        let (_, text, metadata) = result
            .iter()
            .find(|(point, _, _)| point.matches(&id("a")))
            .expect("a present");
        assert_eq!(text, "kitten");
        assert_eq!(metadata.get("topic"), Some(&json!("young")));
    });
}

#[test]
fn test_insert_is_upsert() {
    test_across_backends("insert_is_upsert", |layer| {
        layer.insert("docs", &pets()).unwrap();
        layer.insert("docs", &pets()).unwrap();
        assert_eq!(found(layer.get("docs")).len(), 2);
    });
}

#[test]
fn test_metadata_types_survive() {
    test_across_backends("metadata_types", |layer| {
        let item = VectorItem::new(id("m"), vec![1.0, 0.0], "typed")
            .with_metadata("flag", true)
            .with_metadata("count", 3i64)
            .with_metadata("name", "x");
        layer.upsert("docs", &[item]).unwrap();

        let result = found(layer.get("docs"));
        let (_, _, metadata) = result.iter().next().expect("one item");
        assert_eq!(metadata.get("flag"), Some(&json!(true)));
        assert_eq!(metadata.get("count"), Some(&json!(3)));
        assert_eq!(metadata.get("name"), Some(&json!("x")));
    });
}

#[test]
fn test_empty_metadata_reads_back_empty() {
    test_across_backends("empty_metadata", |layer| {
        layer
            .upsert("docs", &[VectorItem::new(id("bare"), vec![1.0, 0.0], "bare")])
            .unwrap();
        let result = found(layer.get("docs"));
        let (_, _, metadata) = result.iter().next().expect("one item");
        assert!(metadata.is_empty());
    });
}

// =============================================================================
// VALIDATION
// =============================================================================

#[test]
fn test_empty_batch_rejected() {
    test_across_backends("empty_batch", |layer| {
        let err = layer.upsert("docs", &[]).unwrap_err();
        assert!(err.is_invalid_input());
        assert!(!layer.has_collection("docs").unwrap());
    });
}

#[test]
fn test_empty_vector_rejected() {
    let layer = VectorLayer::ephemeral();
    let err = layer
        .upsert("docs", &[VectorItem::new("a", vec![], "nothing")])
        .unwrap_err();
    assert!(err.is_invalid_input());
}

#[test]
fn test_dimension_mismatch_writes_nothing() {
    let layer = VectorLayer::ephemeral();
    layer.upsert("docs", &pets()).unwrap();

    let err = layer
        .upsert(
            "docs",
            &[
                VectorItem::new("c", vec![1.0, 1.0], "ok"),
                VectorItem::new("d", vec![1.0, 1.0, 1.0], "too long"),
            ],
        )
        .unwrap_err();
    assert!(err.is_invalid_input());
    assert_eq!(found(layer.get("docs")).len(), 2);
}

#[test]
fn test_mixed_dimension_first_batch_creates_nothing() {
    test_across_backends("mixed_dimension_first_batch", |layer| {
        let err = layer
            .upsert(
                "fresh",
                &[
                    VectorItem::new(id("a"), vec![1.0, 0.0], "ok"),
                    VectorItem::new(id("b"), vec![1.0, 0.0, 1.0], "too long"),
                ],
            )
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(!layer.has_collection("fresh").unwrap());
        assert!(layer.get("fresh").is_missing());
    });
}

#[test]
fn test_invalid_collection_name() {
    let layer = VectorLayer::ephemeral();
    let err = layer.upsert("bad name", &pets()).unwrap_err();
    assert!(err.is_invalid_input());
    assert!(layer.get("bad name").is_missing());
    assert!(!layer.has_collection("bad name").unwrap());
}
