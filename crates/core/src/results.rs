//! Normalized read results.
//!
//! Both shapes are row-oriented parallel sequences with one level of outer
//! batch wrapping. `SearchResult` has one row per query vector;
//! `GetResult` always has exactly one row.

use crate::types::{Metadata, PointId};
use serde::{Deserialize, Serialize};

/// Ranked nearest-neighbour matches, best first within each row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matched ids, one row per query vector
    pub ids: Vec<Vec<PointId>>,
    /// Backend-reported distance or score, parallel to `ids`
    pub distances: Vec<Vec<f32>>,
    /// Stored texts, parallel to `ids`
    pub documents: Vec<Vec<String>>,
    /// Stored metadata, parallel to `ids`
    pub metadatas: Vec<Vec<Metadata>>,
}

/// One ranked match, borrowed out of a [`SearchResult`] row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit<'a> {
    /// Matched id
    pub id: &'a PointId,
    /// Backend-reported distance or score
    pub distance: f32,
    /// Stored text
    pub document: &'a str,
    /// Stored metadata
    pub metadata: &'a Metadata,
}

impl SearchResult {
    /// Result with no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one row.
    pub fn push_row(
        &mut self,
        ids: Vec<PointId>,
        distances: Vec<f32>,
        documents: Vec<String>,
        metadatas: Vec<Metadata>,
    ) {
        self.ids.push(ids);
        self.distances.push(distances);
        self.documents.push(documents);
        self.metadatas.push(metadatas);
    }

    /// Number of rows (query vectors answered).
    pub fn rows(&self) -> usize {
        self.ids.len()
    }

    /// Ids of the first row, or an empty slice.
    pub fn first_ids(&self) -> &[PointId] {
        self.ids.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over the hits of row `row`.
    pub fn hits(&self, row: usize) -> impl Iterator<Item = SearchHit<'_>> {
        let ids = self.ids.get(row).map(Vec::as_slice).unwrap_or(&[]);
        let distances = self.distances.get(row).map(Vec::as_slice).unwrap_or(&[]);
        let documents = self.documents.get(row).map(Vec::as_slice).unwrap_or(&[]);
        let metadatas = self.metadatas.get(row).map(Vec::as_slice).unwrap_or(&[]);
        ids.iter()
            .zip(distances)
            .zip(documents)
            .zip(metadatas)
            .map(|(((id, distance), document), metadata)| SearchHit {
                id,
                distance: *distance,
                document,
                metadata,
            })
    }

    /// True if no row has any match.
    pub fn is_empty(&self) -> bool {
        self.ids.iter().all(Vec::is_empty)
    }
}

/// Stored items, in backend order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetResult {
    /// Ids, wrapped in exactly one row
    pub ids: Vec<Vec<PointId>>,
    /// Texts, parallel to `ids`
    pub documents: Vec<Vec<String>>,
    /// Metadata, parallel to `ids`
    pub metadatas: Vec<Vec<Metadata>>,
}

impl Default for GetResult {
    fn default() -> Self {
        GetResult {
            ids: vec![Vec::new()],
            documents: vec![Vec::new()],
            metadatas: vec![Vec::new()],
        }
    }
}

impl GetResult {
    /// Build from parallel columns.
    pub fn from_columns(
        ids: Vec<PointId>,
        documents: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> Self {
        GetResult {
            ids: vec![ids],
            documents: vec![documents],
            metadatas: vec![metadatas],
        }
    }

    /// Ids of the single row.
    pub fn ids(&self) -> &[PointId] {
        self.ids.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.ids().len()
    }

    /// True if no items were returned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if an item with this id was returned.
    pub fn contains(&self, id: &str) -> bool {
        self.ids().iter().any(|p| p.matches(id))
    }

    /// Iterate `(id, text, metadata)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&PointId, &str, &Metadata)> {
        let documents = self.documents.first().map(Vec::as_slice).unwrap_or(&[]);
        let metadatas = self.metadatas.first().map(Vec::as_slice).unwrap_or(&[]);
        self.ids()
            .iter()
            .zip(documents)
            .zip(metadatas)
            .map(|((id, doc), meta)| (id, doc.as_str(), meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_result_rows() {
        let mut r = SearchResult::new();
        assert!(r.is_empty());
        r.push_row(
            vec!["a".into()],
            vec![0.1],
            vec!["cat".into()],
            vec![Metadata::new()],
        );
        r.push_row(vec![], vec![], vec![], vec![]);
        assert_eq!(r.rows(), 2);
        assert!(!r.is_empty());
        assert_eq!(r.first_ids(), &[PointId::from("a")]);

        let hits: Vec<_> = r.hits(0).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document, "cat");
        assert_eq!(r.hits(1).count(), 0);
        assert_eq!(r.hits(5).count(), 0);
    }

    #[test]
    fn test_get_result_default_has_one_row() {
        let r = GetResult::default();
        assert_eq!(r.ids.len(), 1);
        assert!(r.is_empty());
    }

    #[test]
    fn test_get_result_iter_and_contains() {
        let r = GetResult::from_columns(
            vec![PointId::from("a"), PointId::Num(2)],
            vec!["x".into(), "y".into()],
            vec![Metadata::new(), Metadata::new()],
        );
        assert_eq!(r.len(), 2);
        assert!(r.contains("a"));
        assert!(r.contains("2"));
        assert!(!r.contains("b"));
        let docs: Vec<_> = r.iter().map(|(_, d, _)| d).collect();
        assert_eq!(docs, vec!["x", "y"]);
    }
}
