//! Item and identifier types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Free-form item metadata. Scalar values are what filters can match.
pub type Metadata = serde_json::Map<String, Value>;

/// One record written to a collection.
///
/// `id` is the natural key: writing an item whose id already exists in the
/// collection replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorItem {
    /// Caller-assigned identifier, unique within a collection
    pub id: String,
    /// Embedding; every item in a collection shares one dimensionality
    pub vector: Vec<f32>,
    /// Source text, stored verbatim
    pub text: String,
    /// Arbitrary metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl VectorItem {
    /// Create an item with empty metadata.
    pub fn new(id: impl Into<String>, vector: Vec<f32>, text: impl Into<String>) -> Self {
        VectorItem {
            id: id.into(),
            vector,
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Set a metadata key.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Vector dimensionality.
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// An id as reported back by a backend.
///
/// Qdrant answers with integers for numeric ids and strings for UUIDs; the
/// other engines always answer with strings. The two are never coerced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    /// Unsigned integer id
    Num(u64),
    /// String id (including UUIDs)
    Str(String),
}

impl PointId {
    /// True if this id is the backend rendering of `id`.
    pub fn matches(&self, id: &str) -> bool {
        match self {
            PointId::Num(n) => id.parse::<u64>().is_ok_and(|v| v == *n),
            PointId::Str(s) => s == id,
        }
    }

    /// Borrow as `&str` when the id is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PointId::Str(s) => Some(s),
            PointId::Num(_) => None,
        }
    }

    /// Parse from a backend JSON value. Returns `None` for anything that is
    /// neither a non-negative integer nor a string.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(PointId::Str(s.clone())),
            Value::Number(n) => n.as_u64().map(PointId::Num),
            _ => None,
        }
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{}", n),
            PointId::Str(s) => f.write_str(s),
        }
    }
}

impl From<u64> for PointId {
    fn from(v: u64) -> Self {
        PointId::Num(v)
    }
}

impl From<String> for PointId {
    fn from(v: String) -> Self {
        PointId::Str(v)
    }
}

impl From<&str> for PointId {
    fn from(v: &str) -> Self {
        PointId::Str(v.to_string())
    }
}
