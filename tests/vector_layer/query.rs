//! Query Tests
//!
//! Metadata equality filters over `query` and full enumeration via `get`.

use crate::*;

#[test]
fn test_query_matches_all_pets() {
    test_across_backends("query_pets", |layer| {
        layer.upsert("docs", &pets()).unwrap();
        let filter = MetadataFilter::new().eq("topic", "pets");
        let result = found(layer.query("docs", &filter, None));
        assert_eq!(result.len(), 2);
    });
}

#[test]
fn test_query_zero_matches_is_found_empty() {
    test_across_backends("query_zero_matches", |layer| {
        layer.upsert("docs", &pets()).unwrap();
        let filter = MetadataFilter::new().eq("topic", "cars");
        let result = found(layer.query("docs", &filter, None));
        assert!(result.is_empty());
    });
}

#[test]
fn test_query_missing_collection() {
    test_across_backends("query_missing", |layer| {
        let filter = MetadataFilter::new().eq("topic", "pets");
        assert!(layer.query("absent", &filter, None).is_missing());
        assert!(layer.get("absent").is_missing());
        assert_eq!(layer.get("absent").into_option(), None);
    });
}

#[test]
fn test_query_conjunction() {
    test_across_backends("query_conjunction", |layer| {
        layer.upsert("docs", &circle(4, "shapes")).unwrap();
        layer.upsert("docs", &circle(2, "other")).unwrap();
        let filter = MetadataFilter::new().eq("topic", "shapes").eq("index", 2i64);
        let result = found(layer.query("docs", &filter, None));
        assert_eq!(sorted_ids(&result), vec![id("shapes-2")]);
    });
}

#[test]
fn test_query_limit() {
    test_across_backends("query_limit", |layer| {
        layer.upsert("docs", &circle(6, "shapes")).unwrap();
        let filter = MetadataFilter::new().eq("topic", "shapes");
        assert_eq!(found(layer.query("docs", &filter, Some(4))).len(), 4);
        assert_eq!(found(layer.query("docs", &filter, Some(0))).len(), 6);
    });
}

#[test]
fn test_query_bool_value() {
    test_across_backends("query_bool", |layer| {
        let items = vec![
            VectorItem::new(id("t"), vec![1.0, 0.0], "yes").with_metadata("active", true),
            VectorItem::new(id("f"), vec![0.0, 1.0], "no").with_metadata("active", false),
        ];
        layer.upsert("docs", &items).unwrap();
        let result = found(layer.query("docs", &MetadataFilter::new().eq("active", true), None));
        assert_eq!(sorted_ids(&result), vec![id("t")]);
    });
}

#[test]
fn test_get_enumerates_beyond_one_page() {
    test_across_backends("get_large", |layer| {
        let items = circle(300, "bulk");
        layer.upsert("docs", &items).unwrap();
        assert_eq!(found(layer.get("docs")).len(), 300);
    });
}
