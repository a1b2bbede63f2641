//! Collection naming policy.
//!
//! Every collection this layer creates is namespaced as
//! `<prefix>_<logical-name>` so that `reset` can find exactly its own
//! collections on a shared backend.

use crate::error::{VectorDbError, VectorDbResult};

/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "veclayer";

/// Maps logical collection names to backend names and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNamer {
    prefix: String,
    identifier_safe: bool,
    lowercase: bool,
}

impl Default for CollectionNamer {
    fn default() -> Self {
        CollectionNamer::new(DEFAULT_PREFIX)
    }
}

impl CollectionNamer {
    /// Namer with the given prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        CollectionNamer {
            prefix: prefix.into(),
            identifier_safe: false,
            lowercase: false,
        }
    }

    /// Restrict names to `[A-Za-z0-9_]` by replacing anything else with `_`.
    ///
    /// Milvus rejects hyphens and dots in collection names.
    pub fn identifier_safe(mut self) -> Self {
        self.identifier_safe = true;
        self.prefix = to_identifier(&self.prefix);
        self
    }

    /// Fold names to lowercase.
    ///
    /// OpenSearch index names must be lowercase, so listing returns the
    /// folded form.
    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self.prefix = self.prefix.to_ascii_lowercase();
        self
    }

    /// The effective prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Backend name for a logical collection name.
    pub fn prefixed(&self, name: &str) -> String {
        let full = if self.identifier_safe {
            format!("{}_{}", self.prefix, to_identifier(name))
        } else {
            format!("{}_{}", self.prefix, name)
        };
        if self.lowercase {
            full.to_ascii_lowercase()
        } else {
            full
        }
    }

    /// True if a backend collection name belongs to this namer.
    pub fn owns(&self, backend_name: &str) -> bool {
        backend_name
            .strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.starts_with('_'))
    }

    /// Logical name for a backend name, or `None` if not owned.
    pub fn logical_name<'a>(&self, backend_name: &'a str) -> Option<&'a str> {
        backend_name
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
    }
}

fn to_identifier(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Check a logical collection name.
///
/// Accepts non-empty names of ASCII letters, digits, `_`, `-` and `.`, which
/// every supported engine can represent once prefixed.
pub fn validate_collection_name(name: &str) -> VectorDbResult<()> {
    if name.is_empty() {
        return Err(VectorDbError::invalid_input("collection name is empty"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(VectorDbError::invalid_input(format!(
            "collection name '{}' contains invalid character '{}'",
            name, c
        )));
    }
    Ok(())
}
