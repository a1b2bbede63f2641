//! Core types for veclayer
//!
//! This crate defines the backend-independent half of the vector store
//! abstraction:
//! - VectorItem, PointId: what is written and what comes back
//! - SearchResult, GetResult: normalized read shapes
//! - MetadataFilter, DeleteSelector: equality filters and delete targets
//! - CollectionNamer: prefixing policy
//! - ReadOutcome: Found / Missing / Unavailable for reads
//! - VectorDb: the trait every backend adapter implements
//! - VectorDbError: error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contract;
pub mod error;
pub mod filter;
pub mod naming;
pub mod normalize;
pub mod outcome;
pub mod results;
pub mod types;

pub use contract::{resolve_limit, validate_batch, VectorDb, NO_LIMIT};
pub use error::{VectorDbError, VectorDbResult};
pub use filter::{DeleteSelector, JsonScalar, MetadataFilter};
pub use naming::{validate_collection_name, CollectionNamer, DEFAULT_PREFIX};
pub use outcome::ReadOutcome;
pub use results::{GetResult, SearchHit, SearchResult};
pub use types::{Metadata, PointId, VectorItem};
