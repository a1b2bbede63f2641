//! Equality-only metadata filters and delete selectors.
//!
//! A filter is a conjunction of `key == scalar` conditions over item
//! metadata. Each adapter translates it into its engine's native filter
//! language; nothing is evaluated client-side except in the memory adapter.

use crate::error::{VectorDbError, VectorDbResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Scalar JSON value for filtering.
///
/// Integers and floats are kept apart: engines such as Qdrant match integer
/// payloads exactly but cannot match floats by equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonScalar {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Non-integer number
    Float(f64),
    /// String value
    String(String),
}

impl JsonScalar {
    /// Check if this scalar matches a JSON value.
    pub fn matches_json(&self, value: &Value) -> bool {
        match (self, value) {
            (JsonScalar::Null, Value::Null) => true,
            (JsonScalar::Bool(a), Value::Bool(b)) => a == b,
            (JsonScalar::Int(a), Value::Number(b)) => match b.as_i64() {
                Some(n) => *a == n,
                None => b.as_f64().is_some_and(|n| (*a as f64 - n).abs() < f64::EPSILON),
            },
            (JsonScalar::Float(a), Value::Number(b)) => {
                b.as_f64().is_some_and(|n| (a - n).abs() < f64::EPSILON)
            }
            (JsonScalar::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            JsonScalar::Null => Value::Null,
            JsonScalar::Bool(b) => Value::Bool(*b),
            JsonScalar::Int(i) => Value::from(*i),
            JsonScalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            JsonScalar::String(s) => Value::String(s.clone()),
        }
    }

    /// Convert from a JSON value; `None` for arrays and objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(JsonScalar::Null),
            Value::Bool(b) => Some(JsonScalar::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(JsonScalar::Int(i)),
                None => n.as_f64().map(JsonScalar::Float),
            },
            Value::String(s) => Some(JsonScalar::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl From<bool> for JsonScalar {
    fn from(v: bool) -> Self {
        JsonScalar::Bool(v)
    }
}

impl From<i32> for JsonScalar {
    fn from(v: i32) -> Self {
        JsonScalar::Int(v as i64)
    }
}

impl From<i64> for JsonScalar {
    fn from(v: i64) -> Self {
        JsonScalar::Int(v)
    }
}

impl From<f64> for JsonScalar {
    fn from(v: f64) -> Self {
        JsonScalar::Float(v)
    }
}

impl From<String> for JsonScalar {
    fn from(v: String) -> Self {
        JsonScalar::String(v)
    }
}

impl From<&str> for JsonScalar {
    fn from(v: &str) -> Self {
        JsonScalar::String(v.to_string())
    }
}

/// Conjunctive equality filter over item metadata.
///
/// Keys are kept sorted so that translated native filters are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    /// Field equality conditions (AND semantics)
    pub equals: BTreeMap<String, JsonScalar>,
}

impl MetadataFilter {
    /// Create an empty filter (matches all).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<JsonScalar>) -> Self {
        self.equals.insert(field.into(), value.into());
        self
    }

    /// Build from a JSON object, rejecting non-scalar values.
    pub fn from_json_map(map: &serde_json::Map<String, Value>) -> VectorDbResult<Self> {
        let mut filter = MetadataFilter::new();
        for (key, value) in map {
            let scalar = JsonScalar::from_json(value).ok_or_else(|| {
                VectorDbError::invalid_input(format!(
                    "filter value for '{}' must be a scalar",
                    key
                ))
            })?;
            filter.equals.insert(key.clone(), scalar);
        }
        Ok(filter)
    }

    /// Check if metadata satisfies every condition.
    ///
    /// A key absent from the metadata never matches, not even `Null`.
    pub fn matches(&self, metadata: &serde_json::Map<String, Value>) -> bool {
        self.equals.iter().all(|(key, expected)| {
            metadata
                .get(key)
                .is_some_and(|actual| expected.matches_json(actual))
        })
    }

    /// True if the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }

    /// Number of conditions.
    pub fn len(&self) -> usize {
        self.equals.len()
    }

    /// Iterate conditions in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonScalar)> {
        self.equals.iter()
    }
}

/// What a `delete` call removes.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteSelector {
    /// Remove exactly these ids
    Ids(Vec<String>),
    /// Remove every item matching the filter
    Filter(MetadataFilter),
}

impl DeleteSelector {
    /// Reject selectors that would otherwise mean "delete everything".
    pub fn validate(&self) -> VectorDbResult<()> {
        match self {
            DeleteSelector::Ids(ids) if ids.is_empty() => Err(VectorDbError::invalid_input(
                "delete requires at least one id",
            )),
            DeleteSelector::Filter(f) if f.is_empty() => Err(VectorDbError::invalid_input(
                "delete requires a non-empty filter",
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn meta(v: Value) -> serde_json::Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    // ========================================
    // JsonScalar
    // ========================================

    #[test]
    fn test_scalar_matches() {
        assert!(JsonScalar::Null.matches_json(&json!(null)));
        assert!(JsonScalar::from(true).matches_json(&json!(true)));
        assert!(JsonScalar::from(3).matches_json(&json!(3)));
        assert!(JsonScalar::from(3).matches_json(&json!(3.0)));
        assert!(JsonScalar::from(0.5).matches_json(&json!(0.5)));
        assert!(JsonScalar::from("pets").matches_json(&json!("pets")));
        assert!(!JsonScalar::from("3").matches_json(&json!(3)));
        assert!(!JsonScalar::Null.matches_json(&json!(false)));
    }

    #[test]
    fn test_scalar_from_json_rejects_containers() {
        assert_eq!(JsonScalar::from_json(&json!(7)), Some(JsonScalar::Int(7)));
        assert_eq!(JsonScalar::from_json(&json!(1.5)), Some(JsonScalar::Float(1.5)));
        assert_eq!(JsonScalar::from_json(&json!([1])), None);
        assert_eq!(JsonScalar::from_json(&json!({"a": 1})), None);
    }

    // ========================================
    // MetadataFilter
    // ========================================

    #[test]
    fn test_filter_and_semantics() {
        let f = MetadataFilter::new().eq("topic", "pets").eq("lang", "en");
        assert!(f.matches(&meta(json!({"topic": "pets", "lang": "en", "x": 1}))));
        assert!(!f.matches(&meta(json!({"topic": "pets"}))));
        assert!(!f.matches(&meta(json!({"topic": "pets", "lang": "fr"}))));
    }

    #[test]
    fn test_filter_absent_key_is_not_null() {
        let f = MetadataFilter::new().eq("gone", JsonScalar::Null);
        assert!(!f.matches(&meta(json!({}))));
        assert!(f.matches(&meta(json!({"gone": null}))));
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let f = MetadataFilter::new();
        assert!(f.is_empty());
        assert!(f.matches(&meta(json!({"anything": 1}))));
    }

    #[test]
    fn test_from_json_map() {
        let f = MetadataFilter::from_json_map(&meta(json!({"a": 1, "b": "x"}))).unwrap();
        assert_eq!(f.len(), 2);
        let keys: Vec<_> = f.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);

        let err = MetadataFilter::from_json_map(&meta(json!({"a": [1, 2]}))).unwrap_err();
        assert!(err.is_invalid_input());
    }

    // ========================================
    // DeleteSelector
    // ========================================

    #[test]
    fn test_selector_validation() {
        assert!(DeleteSelector::Ids(vec![]).validate().is_err());
        assert!(DeleteSelector::Filter(MetadataFilter::new()).validate().is_err());
        assert!(DeleteSelector::Ids(vec!["a".into()]).validate().is_ok());
        assert!(DeleteSelector::Filter(MetadataFilter::new().eq("k", 1))
            .validate()
            .is_ok());
    }

    proptest! {
        #[test]
        fn prop_filter_built_from_metadata_matches_it(
            entries in proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..6)
        ) {
            let mut m = serde_json::Map::new();
            for (k, v) in &entries {
                m.insert(k.clone(), json!(v));
            }
            let f = MetadataFilter::from_json_map(&m).unwrap();
            prop_assert_eq!(f.len(), entries.len());
            prop_assert!(f.matches(&m));
        }
    }
}
