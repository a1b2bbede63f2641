//! Error types shared by every backend adapter.
//!
//! ## Taxonomy
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | `Unavailable` | the backend could not be reached (refused, DNS, timeout, pool exhausted) |
//! | `Backend` | the backend answered but rejected the request |
//! | `InvalidInput` | the caller broke the contract (empty batch, empty delete selector, bad name) |
//! | `DimensionMismatch` | an adapter that enforces dimensionality saw a foreign vector |
//! | `Serialization` | a response did not have the expected shape |
//! | `Config` | connection parameters are unusable |
//!
//! Write operations return these directly. Read operations fold them into
//! [`ReadOutcome::Unavailable`](crate::ReadOutcome::Unavailable).

use thiserror::Error;

/// Errors produced by a [`VectorDb`](crate::VectorDb) adapter.
#[derive(Debug, Error)]
pub enum VectorDbError {
    /// Backend unreachable (connection refused, DNS, timeout)
    #[error("{backend} unavailable: {message}")]
    Unavailable {
        /// Backend identifier (e.g. "qdrant")
        backend: &'static str,
        /// Transport-level description
        message: String,
    },

    /// Backend rejected the request
    #[error("{backend} rejected request ({code}): {message}")]
    Backend {
        /// Backend identifier
        backend: &'static str,
        /// HTTP status or SQLSTATE, as reported by the backend
        code: String,
        /// Backend-supplied message
        message: String,
    },

    /// Caller supplied input the contract does not accept
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Vector dimensionality differs from the collection's
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed at collection creation
        expected: usize,
        /// Dimension of the offending vector
        actual: usize,
    },

    /// Response could not be decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Unusable connection parameters
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for adapter operations.
pub type VectorDbResult<T> = std::result::Result<T, VectorDbError>;

impl VectorDbError {
    /// Construct an `Unavailable` error.
    pub fn unavailable(backend: &'static str, message: impl Into<String>) -> Self {
        VectorDbError::Unavailable {
            backend,
            message: message.into(),
        }
    }

    /// Construct a `Backend` error.
    pub fn backend(
        backend: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        VectorDbError::Backend {
            backend,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Construct an `InvalidInput` error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        VectorDbError::InvalidInput(message.into())
    }

    /// True for connectivity failures.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, VectorDbError::Unavailable { .. })
    }

    /// True for caller contract violations.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            VectorDbError::InvalidInput(_) | VectorDbError::DimensionMismatch { .. }
        )
    }

    /// Check if this error may succeed on retry.
    ///
    /// Connectivity failures, HTTP 429/5xx, and Postgres serialization or
    /// deadlock failures are retryable. Nothing in this crate retries; the
    /// flag is for callers that want to.
    pub fn is_retryable(&self) -> bool {
        match self {
            VectorDbError::Unavailable { .. } => true,
            VectorDbError::Backend { code, .. } => {
                code == "429" || code == "40001" || code == "40P01" || is_http_5xx(code)
            }
            _ => false,
        }
    }
}

fn is_http_5xx(code: &str) -> bool {
    code.len() == 3 && code.starts_with('5') && code.bytes().all(|b| b.is_ascii_digit())
}

impl From<serde_json::Error> for VectorDbError {
    fn from(e: serde_json::Error) -> Self {
        VectorDbError::Serialization(e.to_string())
    }
}
