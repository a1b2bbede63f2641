//! The backend adapter contract.
//!
//! Every engine adapter implements [`VectorDb`] with the same observable
//! semantics so that callers never branch on which engine is configured.
//!
//! ## Collection Model
//!
//! - Callers use logical collection names; adapters store them prefixed
//!   through their [`CollectionNamer`]
//! - A collection is created lazily by the first `upsert`, with the
//!   dimensionality of the first item
//! - Creation is idempotent: an "already exists" answer counts as success
//!
//! ## Error Handling
//!
//! | Path | Connectivity failure | Collection absent |
//! |------|----------------------|-------------------|
//! | writes | `Err(Unavailable)` | created (`upsert`) or no-op (`delete`) |
//! | reads | `ReadOutcome::Unavailable`, logged | `ReadOutcome::Missing` |

use crate::error::{VectorDbError, VectorDbResult};
use crate::filter::{DeleteSelector, MetadataFilter};
use crate::naming::CollectionNamer;
use crate::outcome::ReadOutcome;
use crate::results::{GetResult, SearchResult};
use crate::types::VectorItem;

/// Result-count sentinel meaning "effectively unlimited".
///
/// Backends with a hard cap clamp it to their maximum.
pub const NO_LIMIT: usize = 999_999_999;

/// Resolve an optional limit: `None` and `0` mean [`NO_LIMIT`].
pub fn resolve_limit(limit: Option<usize>) -> usize {
    match limit {
        None | Some(0) => NO_LIMIT,
        Some(n) => n,
    }
}

/// Check an upsert batch and return its dimensionality.
///
/// Rejects empty batches, empty vectors, empty ids and batches whose
/// vectors disagree on dimensionality before anything is sent to a backend.
pub fn validate_batch(items: &[VectorItem]) -> VectorDbResult<usize> {
    let first = items
        .first()
        .ok_or_else(|| VectorDbError::invalid_input("upsert requires at least one item"))?;
    if first.vector.is_empty() {
        return Err(VectorDbError::invalid_input("vector must not be empty"));
    }
    let dimension = first.dimension();
    if let Some(item) = items.iter().find(|i| i.dimension() != dimension) {
        return Err(VectorDbError::DimensionMismatch {
            expected: dimension,
            actual: item.dimension(),
        });
    }
    if let Some(item) = items.iter().find(|i| i.id.is_empty()) {
        return Err(VectorDbError::invalid_input(format!(
            "item with text '{}' has an empty id",
            item.text
        )));
    }
    Ok(dimension)
}

/// Vector store operations shared by every backend.
///
/// Implementations are shared across threads behind `Arc<dyn VectorDb>`.
/// All methods block the calling thread.
pub trait VectorDb: Send + Sync {
    /// Canonical backend identifier (e.g. `"qdrant"`).
    fn backend_name(&self) -> &'static str;

    /// Naming policy in effect.
    fn namer(&self) -> &CollectionNamer;

    /// Check whether a collection exists. Never creates.
    ///
    /// ## Errors
    ///
    /// - `Unavailable`: backend unreachable
    fn has_collection(&self, name: &str) -> VectorDbResult<bool>;

    /// Drop a collection and everything in it.
    ///
    /// ## Semantics
    ///
    /// - Idempotent: dropping a nonexistent collection succeeds
    /// - Other collections are unaffected
    fn delete_collection(&self, name: &str) -> VectorDbResult<()>;

    /// Insert or replace items.
    ///
    /// ## Semantics
    ///
    /// - Creates the collection if absent, using `items[0]`'s dimensionality
    /// - Replaces any item whose id already exists
    ///
    /// ## Errors
    ///
    /// - `InvalidInput`: empty batch or empty vector
    /// - `DimensionMismatch`: engine enforces dimensionality and the batch differs
    /// - `Unavailable` / `Backend`: write failed
    fn upsert(&self, name: &str, items: &[VectorItem]) -> VectorDbResult<()>;

    /// Alias of [`upsert`](VectorDb::upsert). There is no fail-if-exists mode.
    fn insert(&self, name: &str, items: &[VectorItem]) -> VectorDbResult<()> {
        self.upsert(name, items)
    }

    /// Nearest-neighbour search.
    ///
    /// ## Semantics
    ///
    /// - One result row per query vector, in input order
    /// - Rows are ranked best first as reported by the backend
    /// - `limit` of `None` or `0` means [`NO_LIMIT`]
    /// - Zero matches is an empty row, not absence
    fn search(
        &self,
        name: &str,
        vectors: &[Vec<f32>],
        limit: Option<usize>,
    ) -> ReadOutcome<SearchResult>;

    /// Fetch items whose metadata equals every key/value in `filter`.
    fn query(
        &self,
        name: &str,
        filter: &MetadataFilter,
        limit: Option<usize>,
    ) -> ReadOutcome<GetResult>;

    /// Fetch every item in the collection.
    fn get(&self, name: &str) -> ReadOutcome<GetResult>;

    /// Remove items by id set or by metadata filter.
    ///
    /// ## Semantics
    ///
    /// - Deleting from an absent collection is a no-op
    /// - Ids that do not exist are ignored
    ///
    /// ## Errors
    ///
    /// - `InvalidInput`: empty id list or empty filter
    fn delete(&self, name: &str, selector: &DeleteSelector) -> VectorDbResult<()>;

    /// Logical names of every collection carrying this layer's prefix, sorted.
    fn list_collections(&self) -> VectorDbResult<Vec<String>>;

    /// Drop every collection carrying this layer's prefix.
    ///
    /// Collections without the prefix are left untouched.
    fn reset(&self) -> VectorDbResult<()> {
        let names = self.list_collections()?;
        for name in &names {
            self.delete_collection(name)?;
        }
        tracing::info!(
            backend = self.backend_name(),
            count = names.len(),
            "reset dropped collections"
        );
        Ok(())
    }

    /// Release connections. Further calls after `close` may fail.
    fn close(&self) -> VectorDbResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_limit() {
        assert_eq!(resolve_limit(None), NO_LIMIT);
        assert_eq!(resolve_limit(Some(0)), NO_LIMIT);
        assert_eq!(resolve_limit(Some(5)), 5);
    }

    #[test]
    fn test_validate_batch() {
        assert!(validate_batch(&[]).unwrap_err().is_invalid_input());
        assert!(validate_batch(&[VectorItem::new("a", vec![], "t")]).is_err());
        assert!(validate_batch(&[VectorItem::new("", vec![1.0], "t")]).is_err());
        let items = [
            VectorItem::new("a", vec![1.0, 0.0], "x"),
            VectorItem::new("b", vec![0.0, 1.0], "y"),
        ];
        assert_eq!(validate_batch(&items).unwrap(), 2);
    }

    #[test]
    fn test_validate_batch_rejects_mixed_dimensions() {
        let items = [
            VectorItem::new("a", vec![1.0, 0.0], "x"),
            VectorItem::new("b", vec![0.0, 1.0, 0.0], "y"),
        ];
        let err = validate_batch(&items).unwrap_err();
        assert!(matches!(
            err,
            VectorDbError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_vector_db_is_object_safe() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn VectorDb>();
    }
}
