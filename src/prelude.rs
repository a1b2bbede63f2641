//! Convenient imports for veclayer.
//!
//! ```ignore
//! use veclayer::prelude::*;
//!
//! let layer = VectorLayer::ephemeral();
//! layer.upsert("docs", &[VectorItem::new("a", vec![1.0], "text")])?;
//! ```

// Main entry point
pub use crate::layer::{VectorLayer, VectorLayerBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Configuration and dispatch
pub use crate::config::VectorDbConfig;
pub use crate::registry::{BackendFactory, BackendRegistry};

// Core types
pub use veclayer_core::{
    DeleteSelector, GetResult, MetadataFilter, ReadOutcome, SearchResult, VectorDb, VectorItem,
};

// Re-export serde_json for metadata literals
pub use serde_json::json;
