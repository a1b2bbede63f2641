//! Unified error type for veclayer.
//!
//! Wraps adapter errors and adds the failures that can only happen while
//! building a [`VectorLayer`](crate::VectorLayer): reading and parsing
//! configuration.

use thiserror::Error;
use veclayer_core::VectorDbError;

/// All veclayer errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Error raised by the backend adapter
    #[error(transparent)]
    VectorDb(#[from] VectorDbError),

    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML
    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration value is unusable
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for veclayer operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::VectorDb(e) if e.is_retryable())
    }

    /// Check if the backend could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::VectorDb(e) if e.is_unavailable())
    }

    /// Check if the caller supplied invalid input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::VectorDb(e) if e.is_invalid_input())
    }

    /// Check if this is a configuration problem.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::Toml(_) | Error::VectorDb(VectorDbError::Config(_))
        )
    }
}
