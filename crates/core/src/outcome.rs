//! Read-path outcomes.

use crate::error::{VectorDbError, VectorDbResult};

/// Result of a read operation (`search`, `query`, `get`).
///
/// Reads never fail with `Err`. A collection that does not exist is
/// `Missing`; a backend that could not answer is `Unavailable`. Both are
/// distinct from `Found` with an empty result set.
#[derive(Debug)]
#[must_use]
pub enum ReadOutcome<T> {
    /// The collection exists; the result may be empty
    Found(T),
    /// The collection does not exist
    Missing,
    /// The backend failed; the error has already been logged
    Unavailable(VectorDbError),
}

impl<T> ReadOutcome<T> {
    /// Collapse absence and failure into `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            ReadOutcome::Found(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the found value.
    pub fn found(&self) -> Option<&T> {
        match self {
            ReadOutcome::Found(v) => Some(v),
            _ => None,
        }
    }

    /// True if the collection does not exist.
    pub fn is_missing(&self) -> bool {
        matches!(self, ReadOutcome::Missing)
    }

    /// True if the backend failed.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ReadOutcome::Unavailable(_))
    }

    /// Borrow the failure, if any.
    pub fn error(&self) -> Option<&VectorDbError> {
        match self {
            ReadOutcome::Unavailable(e) => Some(e),
            _ => None,
        }
    }

    /// Map the found value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ReadOutcome<U> {
        match self {
            ReadOutcome::Found(v) => ReadOutcome::Found(f(v)),
            ReadOutcome::Missing => ReadOutcome::Missing,
            ReadOutcome::Unavailable(e) => ReadOutcome::Unavailable(e),
        }
    }

    /// Fold an adapter's fallible lookup into an outcome, logging failures.
    ///
    /// `Ok(None)` means the collection was absent.
    pub fn from_read(
        backend: &'static str,
        operation: &'static str,
        collection: &str,
        result: VectorDbResult<Option<T>>,
    ) -> Self {
        match result {
            Ok(Some(v)) => ReadOutcome::Found(v),
            Ok(None) => {
                tracing::debug!(backend, operation, collection, "collection missing");
                ReadOutcome::Missing
            }
            Err(e) => {
                tracing::warn!(backend, operation, collection, error = %e, "read failed");
                ReadOutcome::Unavailable(e)
            }
        }
    }
}
