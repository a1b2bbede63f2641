//! In-process backend.
//!
//! ## Design
//!
//! `MemoryStore` plays the role of a server: a `RwLock<BTreeMap>` of
//! collections keyed by their prefixed name. `MemoryVectorDb` is the adapter
//! over it. Several adapters with different prefixes can share one store,
//! which is how foreign collections are modelled.
//!
//! Search is brute-force cosine. Distances are `1 - cosine_similarity`,
//! ascending, ties broken by id for determinism.
//!
//! Nothing is persisted.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use veclayer_core::normalize::{self, ScoredPoint, StoredPoint};
use veclayer_core::{
    resolve_limit, validate_batch, validate_collection_name, CollectionNamer, DeleteSelector,
    GetResult, MetadataFilter, PointId, ReadOutcome, SearchResult, VectorDb, VectorDbError,
    VectorDbResult, VectorItem,
};

const BACKEND: &str = "memory";

#[derive(Debug, Clone)]
struct MemoryCollection {
    dimension: usize,
    /// BTreeMap for deterministic enumeration order
    points: BTreeMap<String, VectorItem>,
}

/// Shared in-process collection storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, MemoryCollection>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every collection name in the store, prefixed or not.
    pub fn raw_collection_names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }
}

/// `VectorDb` over a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryVectorDb {
    store: Arc<MemoryStore>,
    namer: CollectionNamer,
}

impl MemoryVectorDb {
    /// Adapter over a fresh private store.
    pub fn new(prefix: &str) -> Self {
        Self::with_shared_store(prefix, Arc::new(MemoryStore::new()))
    }

    /// Adapter over an existing store.
    pub fn with_shared_store(prefix: &str, store: Arc<MemoryStore>) -> Self {
        MemoryVectorDb {
            store,
            namer: CollectionNamer::new(prefix),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    fn collection_key(&self, name: &str) -> Option<String> {
        validate_collection_name(name).ok()?;
        Some(self.namer.prefixed(name))
    }

    fn read_points<T>(
        &self,
        name: &str,
        f: impl FnOnce(&MemoryCollection) -> VectorDbResult<T>,
    ) -> VectorDbResult<Option<T>> {
        let Some(key) = self.collection_key(name) else {
            return Ok(None);
        };
        let collections = self.store.collections.read();
        match collections.get(&key) {
            Some(collection) => f(collection).map(Some),
            None => Ok(None),
        }
    }

    fn search_inner(
        &self,
        name: &str,
        vectors: &[Vec<f32>],
        limit: usize,
    ) -> VectorDbResult<Option<SearchResult>> {
        self.read_points(name, |collection| {
            let mut rows = Vec::with_capacity(vectors.len());
            for query in vectors {
                if query.len() != collection.dimension {
                    return Err(VectorDbError::DimensionMismatch {
                        expected: collection.dimension,
                        actual: query.len(),
                    });
                }
                let mut scored: Vec<(f32, &VectorItem)> = collection
                    .points
                    .values()
                    .map(|item| (1.0 - cosine_similarity(query, &item.vector), item))
                    .collect();
                scored.sort_by(|a, b| {
                    a.0.partial_cmp(&b.0)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.1.id.cmp(&b.1.id))
                });
                scored.truncate(limit);
                rows.push(
                    scored
                        .into_iter()
                        .map(|(distance, item)| ScoredPoint {
                            id: PointId::Str(item.id.clone()),
                            score: distance,
                            text: item.text.clone(),
                            metadata: item.metadata.clone(),
                        })
                        .collect(),
                );
            }
            Ok(normalize::search_result(rows))
        })
    }

    fn query_inner(
        &self,
        name: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> VectorDbResult<Option<GetResult>> {
        self.read_points(name, |collection| {
            let points = collection
                .points
                .values()
                .filter(|item| filter.map_or(true, |f| f.matches(&item.metadata)))
                .take(limit)
                .map(|item| StoredPoint {
                    id: PointId::Str(item.id.clone()),
                    text: item.text.clone(),
                    metadata: item.metadata.clone(),
                })
                .collect();
            Ok(normalize::get_result(points))
        })
    }
}

/// Cosine similarity; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

impl VectorDb for MemoryVectorDb {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn namer(&self) -> &CollectionNamer {
        &self.namer
    }

    fn has_collection(&self, name: &str) -> VectorDbResult<bool> {
        let Some(key) = self.collection_key(name) else {
            return Ok(false);
        };
        Ok(self.store.collections.read().contains_key(&key))
    }

    fn delete_collection(&self, name: &str) -> VectorDbResult<()> {
        let Some(key) = self.collection_key(name) else {
            return Ok(());
        };
        if self.store.collections.write().remove(&key).is_some() {
            tracing::info!(backend = BACKEND, collection = %key, "dropped collection");
        }
        Ok(())
    }

    fn upsert(&self, name: &str, items: &[VectorItem]) -> VectorDbResult<()> {
        validate_collection_name(name)?;
        let dimension = validate_batch(items)?;
        let key = self.namer.prefixed(name);

        let mut collections = self.store.collections.write();
        // The batch is uniform, so one comparison decides it before anything is created.
        if let Some(existing) = collections.get(&key) {
            if existing.dimension != dimension {
                return Err(VectorDbError::DimensionMismatch {
                    expected: existing.dimension,
                    actual: dimension,
                });
            }
        }
        let collection = collections.entry(key.clone()).or_insert_with(|| {
            tracing::info!(backend = BACKEND, collection = %key, dimension, "created collection");
            MemoryCollection {
                dimension,
                points: BTreeMap::new(),
            }
        });

        for item in items {
            collection.points.insert(item.id.clone(), item.clone());
        }
        tracing::debug!(backend = BACKEND, collection = %key, count = items.len(), "upserted");
        Ok(())
    }

    fn search(
        &self,
        name: &str,
        vectors: &[Vec<f32>],
        limit: Option<usize>,
    ) -> ReadOutcome<SearchResult> {
        let result = self.search_inner(name, vectors, resolve_limit(limit));
        ReadOutcome::from_read(BACKEND, "search", name, result)
    }

    fn query(
        &self,
        name: &str,
        filter: &MetadataFilter,
        limit: Option<usize>,
    ) -> ReadOutcome<GetResult> {
        let result = self.query_inner(name, Some(filter), resolve_limit(limit));
        ReadOutcome::from_read(BACKEND, "query", name, result)
    }

    fn get(&self, name: &str) -> ReadOutcome<GetResult> {
        let result = self.query_inner(name, None, resolve_limit(None));
        ReadOutcome::from_read(BACKEND, "get", name, result)
    }

    fn delete(&self, name: &str, selector: &DeleteSelector) -> VectorDbResult<()> {
        selector.validate()?;
        let Some(key) = self.collection_key(name) else {
            return Ok(());
        };
        let mut collections = self.store.collections.write();
        let Some(collection) = collections.get_mut(&key) else {
            return Ok(());
        };
        let before = collection.points.len();
        match selector {
            DeleteSelector::Ids(ids) => {
                for id in ids {
                    collection.points.remove(id);
                }
            }
            DeleteSelector::Filter(filter) => {
                collection.points.retain(|_, item| !filter.matches(&item.metadata));
            }
        }
        tracing::debug!(
            backend = BACKEND,
            collection = %key,
            count = before - collection.points.len(),
            "deleted"
        );
        Ok(())
    }

    fn list_collections(&self) -> VectorDbResult<Vec<String>> {
        let collections = self.store.collections.read();
        Ok(collections
            .keys()
            .filter_map(|k| self.namer.logical_name(k))
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn pets() -> Vec<VectorItem> {
        vec![
            VectorItem::new("a", vec![0.0, 1.0], "cat").with_metadata("topic", "pets"),
            VectorItem::new("b", vec![1.0, 0.0], "dog").with_metadata("topic", "pets"),
        ]
    }

    #[test]
    fn test_memory_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MemoryVectorDb>();
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_upsert_creates_with_first_dimension() {
        let db = MemoryVectorDb::new("t");
        assert!(!db.has_collection("docs").unwrap());
        db.upsert("docs", &pets()).unwrap();
        assert!(db.has_collection("docs").unwrap());
        assert_eq!(db.store().raw_collection_names(), vec!["t_docs".to_string()]);
    }

    #[test]
    fn test_dimension_mismatch_writes_nothing() {
        let db = MemoryVectorDb::new("t");
        db.upsert("docs", &pets()).unwrap();
        let batch = vec![
            VectorItem::new("c", vec![1.0, 1.0], "ok"),
            VectorItem::new("d", vec![1.0, 1.0, 1.0], "bad"),
        ];
        let err = db.upsert("docs", &batch).unwrap_err();
        assert!(matches!(
            err,
            VectorDbError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(db.get("docs").into_option().unwrap().len(), 2);
    }

    #[test]
    fn test_rejected_first_batch_creates_nothing() {
        let db = MemoryVectorDb::new("t");
        let batch = vec![
            VectorItem::new("a", vec![1.0, 0.0], "ok"),
            VectorItem::new("b", vec![1.0, 0.0, 1.0], "bad"),
        ];
        assert!(db.upsert("fresh", &batch).is_err());
        assert!(!db.has_collection("fresh").unwrap());
        assert!(db.store().raw_collection_names().is_empty());
    }

    #[test]
    fn test_foreign_dimension_batch_rejected_whole() {
        let db = MemoryVectorDb::new("t");
        db.upsert("docs", &pets()).unwrap();
        let batch = vec![VectorItem::new("c", vec![1.0, 1.0, 1.0], "wide")];
        let err = db.upsert("docs", &batch).unwrap_err();
        assert!(matches!(
            err,
            VectorDbError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert!(!db.get("docs").into_option().unwrap().contains("c"));
    }

    #[test]
    fn test_search_ranks_by_distance() {
        let db = MemoryVectorDb::new("t");
        db.upsert("docs", &pets()).unwrap();
        let r = db.search("docs", &[vec![0.0, 1.0], vec![1.0, 0.0]], Some(1));
        let r = r.into_option().unwrap();
        assert_eq!(r.rows(), 2);
        assert!(r.ids[0][0].matches("a"));
        assert!(r.ids[1][0].matches("b"));
        assert!(r.distances[0][0].abs() < 1e-6);
    }

    #[test]
    fn test_search_wrong_dimension_is_unavailable() {
        let db = MemoryVectorDb::new("t");
        db.upsert("docs", &pets()).unwrap();
        assert!(db.search("docs", &[vec![1.0]], None).is_unavailable());
    }

    #[test]
    fn test_reads_on_missing_collection() {
        let db = MemoryVectorDb::new("t");
        assert!(db.get("nope").is_missing());
        assert!(db.search("nope", &[vec![1.0]], None).is_missing());
        assert!(db.query("bad name", &MetadataFilter::new(), None).is_missing());
    }

    #[test]
    fn test_delete_by_filter() {
        let db = MemoryVectorDb::new("t");
        let mut items = pets();
        items.push(VectorItem::new("c", vec![1.0, 1.0], "fish").with_metadata("topic", "food"));
        db.upsert("docs", &items).unwrap();
        db.delete(
            "docs",
            &DeleteSelector::Filter(MetadataFilter::new().eq("topic", "pets")),
        )
        .unwrap();
        let r = db.get("docs").into_option().unwrap();
        assert_eq!(r.len(), 1);
        assert!(r.contains("c"));
        assert_eq!(r.metadatas[0][0].get("topic"), Some(&json!("food")));
    }

    #[test]
    fn test_shared_store_reset_isolation() {
        let store = Arc::new(MemoryStore::new());
        let ours = MemoryVectorDb::with_shared_store("ours", store.clone());
        let theirs = MemoryVectorDb::with_shared_store("theirs", store.clone());
        ours.upsert("a", &pets()).unwrap();
        theirs.upsert("a", &pets()).unwrap();

        ours.reset().unwrap();
        assert!(ours.list_collections().unwrap().is_empty());
        assert_eq!(theirs.list_collections().unwrap(), vec!["a".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_upsert_then_get_returns_every_item(
            items in proptest::collection::btree_map("[a-z0-9-]{1,12}", ".{0,20}", 1..24)
        ) {
            let db = MemoryVectorDb::new("t");
            let batch: Vec<VectorItem> = items
                .iter()
                .enumerate()
                .map(|(i, (id, text))| VectorItem::new(id.as_str(), vec![1.0, i as f32], text.as_str()))
                .collect();
            db.upsert("docs", &batch).unwrap();

            let result = db.get("docs").into_option().unwrap();
            prop_assert_eq!(result.len(), items.len());
            for (point, text, _) in result.iter() {
                let id = point.as_str().unwrap();
                prop_assert_eq!(items.get(id).map(String::as_str), Some(text));
            }
        }

        #[test]
        fn prop_search_distances_ascend(
            vectors in proptest::collection::vec((-1.0f32..1.0, -1.0f32..1.0), 1..16),
            query in (-1.0f32..1.0, -1.0f32..1.0),
        ) {
            let db = MemoryVectorDb::new("t");
            let batch: Vec<VectorItem> = vectors
                .iter()
                .enumerate()
                .map(|(i, (x, y))| VectorItem::new(format!("p{}", i), vec![*x, *y], ""))
                .collect();
            db.upsert("docs", &batch).unwrap();

            let result = db.search("docs", &[vec![query.0, query.1]], None).into_option().unwrap();
            prop_assert_eq!(result.ids[0].len(), vectors.len());
            prop_assert!(result.distances[0].windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
