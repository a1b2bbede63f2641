//! Conversion of native backend records into [`SearchResult`] and
//! [`GetResult`].
//!
//! Adapters first decode their wire format into [`ScoredPoint`] or
//! [`StoredPoint`] and then hand whole rows to these functions. Order is
//! preserved. A missing text becomes `""` and missing metadata becomes `{}`;
//! nothing else is coerced.

use crate::error::{VectorDbError, VectorDbResult};
use crate::results::{GetResult, SearchResult};
use crate::types::{Metadata, PointId};
use serde_json::Value;

/// A ranked match decoded from a backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    /// Backend id
    pub id: PointId,
    /// Distance or similarity, as the backend reports it
    pub score: f32,
    /// Stored text
    pub text: String,
    /// Stored metadata
    pub metadata: Metadata,
}

/// A stored item decoded from a backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    /// Backend id
    pub id: PointId,
    /// Stored text
    pub text: String,
    /// Stored metadata
    pub metadata: Metadata,
}

impl ScoredPoint {
    /// Decode from an id, score and a `{"text", "metadata"}` envelope.
    pub fn from_envelope(id: &Value, score: f32, payload: Option<&Value>) -> VectorDbResult<Self> {
        let (text, metadata) = split_envelope(payload)?;
        Ok(ScoredPoint {
            id: point_id(id)?,
            score,
            text,
            metadata,
        })
    }
}

impl StoredPoint {
    /// Decode from an id and a `{"text", "metadata"}` envelope.
    pub fn from_envelope(id: &Value, payload: Option<&Value>) -> VectorDbResult<Self> {
        let (text, metadata) = split_envelope(payload)?;
        Ok(StoredPoint {
            id: point_id(id)?,
            text,
            metadata,
        })
    }
}

fn point_id(id: &Value) -> VectorDbResult<PointId> {
    PointId::from_json(id)
        .ok_or_else(|| VectorDbError::Serialization(format!("unsupported point id: {}", id)))
}

/// Split a payload envelope into text and metadata.
pub fn split_envelope(payload: Option<&Value>) -> VectorDbResult<(String, Metadata)> {
    let Some(payload) = payload else {
        return Ok((String::new(), Metadata::new()));
    };
    let text = payload
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let metadata = metadata_value(payload.get("metadata"))?;
    Ok((text, metadata))
}

/// Decode a metadata field.
///
/// Some engines hand JSON columns back as encoded strings; those are parsed.
/// `null` and absence both become an empty map.
pub fn metadata_value(value: Option<&Value>) -> VectorDbResult<Metadata> {
    match value {
        None | Some(Value::Null) => Ok(Metadata::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(encoded)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Metadata::new()),
            other => Err(VectorDbError::Serialization(format!(
                "metadata is not an object: {}",
                other
            ))),
        },
        Some(other) => Err(VectorDbError::Serialization(format!(
            "metadata is not an object: {}",
            other
        ))),
    }
}

/// Build a search result, one row per query vector.
pub fn search_result(rows: Vec<Vec<ScoredPoint>>) -> SearchResult {
    let mut result = SearchResult::new();
    for row in rows {
        let mut ids = Vec::with_capacity(row.len());
        let mut distances = Vec::with_capacity(row.len());
        let mut documents = Vec::with_capacity(row.len());
        let mut metadatas = Vec::with_capacity(row.len());
        for p in row {
            ids.push(p.id);
            distances.push(p.score);
            documents.push(p.text);
            metadatas.push(p.metadata);
        }
        result.push_row(ids, distances, documents, metadatas);
    }
    result
}

/// Build a get result from stored points.
pub fn get_result(points: Vec<StoredPoint>) -> GetResult {
    let mut ids = Vec::with_capacity(points.len());
    let mut documents = Vec::with_capacity(points.len());
    let mut metadatas = Vec::with_capacity(points.len());
    for p in points {
        ids.push(p.id);
        documents.push(p.text);
        metadatas.push(p.metadata);
    }
    GetResult::from_columns(ids, documents, metadatas)
}

/// Zip column-oriented arrays (`ids`, `documents`, `metadatas`) into stored
/// points. Missing or short `documents`/`metadatas` columns fill with
/// defaults.
pub fn columns(
    ids: &[Value],
    documents: Option<&Vec<Value>>,
    metadatas: Option<&Vec<Value>>,
) -> VectorDbResult<Vec<StoredPoint>> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let text = documents
                .and_then(|d| d.get(i))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let metadata = metadata_value(metadatas.and_then(|m| m.get(i)))?;
            Ok(StoredPoint {
                id: point_id(id)?,
                text,
                metadata,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_envelope_defaults() {
        let p = StoredPoint::from_envelope(&json!("a"), None).unwrap();
        assert_eq!(p.text, "");
        assert!(p.metadata.is_empty());

        let p = StoredPoint::from_envelope(&json!(5), Some(&json!({"text": "hi"}))).unwrap();
        assert_eq!(p.id, PointId::Num(5));
        assert_eq!(p.text, "hi");
    }

    #[test]
    fn test_metadata_as_encoded_string() {
        let m = metadata_value(Some(&json!("{\"topic\":\"pets\"}"))).unwrap();
        assert_eq!(m.get("topic"), Some(&json!("pets")));
        assert!(metadata_value(Some(&json!("[1]"))).is_err());
        assert!(metadata_value(Some(&json!(3))).is_err());
    }

    #[test]
    fn test_bad_id_is_serialization_error() {
        let err = StoredPoint::from_envelope(&json!({"x": 1}), None).unwrap_err();
        assert!(matches!(err, VectorDbError::Serialization(_)));
    }

    #[test]
    fn test_search_result_keeps_order_and_rows() {
        let row = vec![
            ScoredPoint::from_envelope(&json!("b"), 0.9, Some(&json!({"text": "dog"}))).unwrap(),
            ScoredPoint::from_envelope(&json!("a"), 0.1, Some(&json!({"text": "cat"}))).unwrap(),
        ];
        let r = search_result(vec![row, vec![]]);
        assert_eq!(r.rows(), 2);
        assert_eq!(r.ids[0], vec![PointId::from("b"), PointId::from("a")]);
        assert_eq!(r.distances[0], vec![0.9, 0.1]);
        assert_eq!(r.documents[0], vec!["dog".to_string(), "cat".to_string()]);
        assert!(r.ids[1].is_empty());
    }

    #[test]
    fn test_columns_fill_missing() {
        let ids = vec![json!("a"), json!("b")];
        let docs = vec![json!("x")];
        let metas = vec![json!(null), json!({"k": 1})];
        let points = columns(&ids, Some(&docs), Some(&metas)).unwrap();
        assert_eq!(points[0].text, "x");
        assert_eq!(points[1].text, "");
        assert!(points[0].metadata.is_empty());
        assert_eq!(points[1].metadata.get("k"), Some(&json!(1)));

        let points = columns(&ids, None, None).unwrap();
        assert_eq!(points.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_get_result_preserves_order(ids in proptest::collection::vec("[a-z0-9]{1,8}", 0..20)) {
            let points: Vec<StoredPoint> = ids
                .iter()
                .map(|id| StoredPoint { id: PointId::from(id.as_str()), text: id.clone(), metadata: Metadata::new() })
                .collect();
            let r = get_result(points);
            prop_assert_eq!(r.ids.len(), 1);
            prop_assert_eq!(r.len(), ids.len());
            for (i, (pid, text, _)) in r.iter().enumerate() {
                prop_assert!(pid.matches(&ids[i]));
                prop_assert_eq!(text, ids[i].as_str());
            }
        }
    }
}
