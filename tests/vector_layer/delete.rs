//! Delete Tests
//!
//! - by id set
//! - by metadata filter
//! - empty selectors are rejected

use crate::*;

#[test]
fn test_delete_by_ids_removes_exactly_those() {
    test_across_backends("delete_ids", |layer| {
        layer.upsert("docs", &pets()).unwrap();
        layer
            .delete("docs", &DeleteSelector::Ids(vec![id("a")]))
            .unwrap();

        let result = found(layer.get("docs"));
        assert_eq!(sorted_ids(&result), vec![id("b")]);
    });
}

#[test]
fn test_delete_unknown_ids_ignored() {
    test_across_backends("delete_unknown_ids", |layer| {
        layer.upsert("docs", &pets()).unwrap();
        layer
            .delete("docs", &DeleteSelector::Ids(vec![id("zzz")]))
            .unwrap();
        assert_eq!(found(layer.get("docs")).len(), 2);
    });
}

#[test]
fn test_delete_by_filter() {
    test_across_backends("delete_filter", |layer| {
        layer.upsert("docs", &circle(3, "shapes")).unwrap();
        layer.upsert("docs", &pets()).unwrap();
        let selector = DeleteSelector::Filter(MetadataFilter::new().eq("topic", "shapes"));
        layer.delete("docs", &selector).unwrap();

        let result = found(layer.get("docs"));
        let mut expected = vec![id("a"), id("b")];
        expected.sort();
        assert_eq!(sorted_ids(&result), expected);
    });
}

#[test]
fn test_delete_from_missing_collection_is_noop() {
    test_across_backends("delete_missing", |layer| {
        layer
            .delete("absent", &DeleteSelector::Ids(vec![id("a")]))
            .unwrap();
        assert!(!layer.has_collection("absent").unwrap());
    });
}

#[test]
fn test_empty_selectors_rejected() {
    test_across_backends("delete_empty_selector", |layer| {
        layer.upsert("docs", &pets()).unwrap();
        let err = layer.delete("docs", &DeleteSelector::Ids(vec![])).unwrap_err();
        assert!(err.is_invalid_input());
        let err = layer
            .delete("docs", &DeleteSelector::Filter(MetadataFilter::new()))
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(found(layer.get("docs")).len(), 2);
    });
}

/// The cat/dog walkthrough end to end.
#[test]
fn test_pets_scenario() {
    let layer = VectorLayer::ephemeral();
    let items = vec![
        VectorItem::new("a", vec![0.0, 1.0], "cat").with_metadata("topic", "pets"),
        VectorItem::new("b", vec![1.0, 0.0], "dog").with_metadata("topic", "pets"),
    ];
    layer.upsert("docs", &items).unwrap();

    let nearest = found(layer.search("docs", &[vec![0.0, 1.0]], Some(1)));
    assert!(nearest.first_ids()[0].matches("a"));

    let pets = found(layer.query("docs", &MetadataFilter::new().eq("topic", "pets"), None));
    assert_eq!(pets.len(), 2);

    layer
        .delete("docs", &DeleteSelector::Ids(vec!["a".into()]))
        .unwrap();
    let rest = found(layer.get("docs"));
    assert_eq!(rest.len(), 1);
    assert!(rest.contains("b"));
}
