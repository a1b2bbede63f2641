//! # veclayer
//!
//! Vector store abstraction for retrieval-augmented generation.
//!
//! One [`VectorLayer`] handle fronts whichever engine is configured
//! (Chroma, Qdrant, Milvus, OpenSearch, pgvector, or in-memory) with identical
//! semantics, so callers never branch on the backend.
//!
//! ## Quick Start
//!
//! ```ignore
//! use veclayer::prelude::*;
//!
//! // Backend chosen by VECTOR_DB, falling back to chroma
//! let layer = VectorLayer::from_env()?;
//!
//! layer.upsert("docs", &[
//!     VectorItem::new("a", vec![0.0, 1.0], "cat").with_metadata("topic", "pets"),
//!     VectorItem::new("b", vec![1.0, 0.0], "dog").with_metadata("topic", "pets"),
//! ])?;
//!
//! let nearest = layer.search("docs", &[vec![0.0, 1.0]], Some(1));
//! let pets = layer.query("docs", &MetadataFilter::new().eq("topic", "pets"), None);
//! layer.delete("docs", &DeleteSelector::Ids(vec!["a".into()]))?;
//!
//! layer.close()?;
//! ```
//!
//! ## Reads Never Fail
//!
//! `search`, `query` and `get` return a [`ReadOutcome`]: `Found`, `Missing`
//! when the collection does not exist, or `Unavailable` when the backend
//! could not answer. Writes return [`Result`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
mod error;
mod layer;
pub mod registry;

pub mod prelude;

pub use config::VectorDbConfig;
pub use error::{Error, Result};
pub use layer::{VectorLayer, VectorLayerBuilder};
pub use registry::{BackendFactory, BackendRegistry};

pub use veclayer_core::{
    CollectionNamer, DeleteSelector, GetResult, JsonScalar, Metadata, MetadataFilter, PointId,
    ReadOutcome, SearchHit, SearchResult, VectorDb, VectorDbError, VectorItem, NO_LIMIT,
};
