//! Backend adapters for veclayer
//!
//! One [`VectorDb`](veclayer_core::VectorDb) implementation per engine:
//! - [`MemoryVectorDb`]: in-process, no server
//! - [`ChromaVectorDb`]: document-store style (REST v2)
//! - [`QdrantVectorDb`]: point/payload style (REST)
//! - [`MilvusVectorDb`]: columnar-index style (REST v2)
//! - [`OpenSearchVectorDb`]: search-index style (REST, k-NN plugin)
//! - [`PgvectorVectorDb`]: relational with vector extension (sqlx)
//!
//! The REST adapters share the blocking [`http::HttpTransport`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chroma;
pub mod http;
pub mod memory;
pub mod milvus;
pub mod opensearch;
pub mod pgvector;
pub mod qdrant;

pub use chroma::{ChromaConfig, ChromaVectorDb};
pub use memory::{MemoryStore, MemoryVectorDb};
pub use milvus::{MilvusConfig, MilvusVectorDb};
pub use opensearch::{OpenSearchConfig, OpenSearchVectorDb};
pub use pgvector::{PgvectorConfig, PgvectorVectorDb};
pub use qdrant::{QdrantConfig, QdrantVectorDb};
