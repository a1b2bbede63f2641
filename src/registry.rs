//! Backend registry.
//!
//! Maps backend identifiers to the factories that build their adapters.
//! Lookups are case-insensitive and every factory may register aliases.
//!
//! # Default Backends
//!
//! | Name | Aliases | Adapter |
//! |------|---------|---------|
//! | `chroma` | | [`ChromaVectorDb`] |
//! | `qdrant` | | [`QdrantVectorDb`] |
//! | `milvus` | | [`MilvusVectorDb`] |
//! | `opensearch` | | [`OpenSearchVectorDb`] |
//! | `pgvector` | `postgres` | [`PgvectorVectorDb`] |
//! | `memory` | `inmemory`, `ephemeral` | [`MemoryVectorDb`] |
//!
//! # Custom Backends
//!
//! ```ignore
//! struct MyFactory;
//!
//! impl BackendFactory for MyFactory {
//!     fn name(&self) -> &'static str { "mine" }
//!     fn create(&self, config: &VectorDbConfig) -> Result<Arc<dyn VectorDb>> {
//!         Ok(Arc::new(MyVectorDb::new(&config.collection_prefix)))
//!     }
//! }
//!
//! let mut registry = BackendRegistry::with_defaults();
//! registry.register(Arc::new(MyFactory));
//! ```

use crate::config::{VectorDbConfig, DEFAULT_BACKEND};
use crate::error::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use veclayer_backends::{
    ChromaVectorDb, MemoryVectorDb, MilvusVectorDb, OpenSearchVectorDb, PgvectorVectorDb,
    QdrantVectorDb,
};
use veclayer_core::VectorDb;

/// Builds one kind of backend adapter.
pub trait BackendFactory: Send + Sync {
    /// Canonical backend name.
    fn name(&self) -> &'static str;

    /// Alternative names that resolve to this factory.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Build an adapter from the settings in `config`.
    ///
    /// ## Errors
    ///
    /// - `Config`: required connection settings are missing
    /// - `Unavailable`: adapters that connect eagerly could not connect
    fn create(&self, config: &VectorDbConfig) -> Result<Arc<dyn VectorDb>>;
}

/// Registry of backend factories keyed by lowercase name and alias.
#[derive(Clone)]
pub struct BackendRegistry {
    factories: HashMap<String, Arc<dyn BackendFactory>>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BackendRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        BackendRegistry {
            factories: HashMap::new(),
        }
    }

    /// Registry holding every built-in backend.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ChromaFactory));
        registry.register(Arc::new(QdrantFactory));
        registry.register(Arc::new(MilvusFactory));
        registry.register(Arc::new(OpenSearchFactory));
        registry.register(Arc::new(PgvectorFactory));
        registry.register(Arc::new(MemoryFactory));
        registry
    }

    /// Register a factory under its name and aliases.
    ///
    /// A later registration replaces an earlier one with the same key.
    pub fn register(&mut self, factory: Arc<dyn BackendFactory>) {
        let name = factory.name().to_lowercase();
        for alias in factory.aliases() {
            self.factories
                .insert(alias.to_lowercase(), Arc::clone(&factory));
        }
        self.factories.insert(name, factory);
    }

    /// Look up a factory by name or alias.
    pub fn get(&self, name: &str) -> Option<Arc<dyn BackendFactory>> {
        self.factories.get(&name.trim().to_lowercase()).cloned()
    }

    /// Check whether a name or alias is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.trim().to_lowercase())
    }

    /// Canonical backend names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .values()
            .map(|f| f.name().to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Every registered key including aliases, sorted.
    pub fn all_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve a backend name, falling back to the default backend.
    ///
    /// Returns `None` only when neither `name` nor the default is registered.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn BackendFactory>> {
        if let Some(factory) = self.get(name) {
            return Some(factory);
        }
        tracing::warn!(
            requested = name,
            fallback = DEFAULT_BACKEND,
            "unknown vector backend, using default"
        );
        self.get(DEFAULT_BACKEND)
    }

    /// Resolve `config.backend` and build its adapter.
    pub fn create(&self, config: &VectorDbConfig) -> Result<Arc<dyn VectorDb>> {
        let factory = self.resolve(&config.backend).ok_or_else(|| {
            crate::Error::Config(format!(
                "backend '{}' is not registered and no default is available",
                config.backend
            ))
        })?;
        tracing::debug!(
            backend = factory.name(),
            prefix = %config.collection_prefix,
            "creating vector backend"
        );
        factory.create(config)
    }
}

// ============================================================================
// Built-in factories
// ============================================================================

struct ChromaFactory;

impl BackendFactory for ChromaFactory {
    fn name(&self) -> &'static str {
        "chroma"
    }

    fn create(&self, config: &VectorDbConfig) -> Result<Arc<dyn VectorDb>> {
        Ok(Arc::new(ChromaVectorDb::new(
            &config.chroma,
            &config.collection_prefix,
        )))
    }
}

struct QdrantFactory;

impl BackendFactory for QdrantFactory {
    fn name(&self) -> &'static str {
        "qdrant"
    }

    fn create(&self, config: &VectorDbConfig) -> Result<Arc<dyn VectorDb>> {
        Ok(Arc::new(QdrantVectorDb::new(
            &config.qdrant,
            &config.collection_prefix,
        )))
    }
}

struct MilvusFactory;

impl BackendFactory for MilvusFactory {
    fn name(&self) -> &'static str {
        "milvus"
    }

    fn create(&self, config: &VectorDbConfig) -> Result<Arc<dyn VectorDb>> {
        Ok(Arc::new(MilvusVectorDb::new(
            &config.milvus,
            &config.collection_prefix,
        )))
    }
}

struct OpenSearchFactory;

impl BackendFactory for OpenSearchFactory {
    fn name(&self) -> &'static str {
        "opensearch"
    }

    fn create(&self, config: &VectorDbConfig) -> Result<Arc<dyn VectorDb>> {
        Ok(Arc::new(OpenSearchVectorDb::new(
            &config.opensearch,
            &config.collection_prefix,
        )))
    }
}

struct PgvectorFactory;

impl BackendFactory for PgvectorFactory {
    fn name(&self) -> &'static str {
        "pgvector"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["postgres"]
    }

    fn create(&self, config: &VectorDbConfig) -> Result<Arc<dyn VectorDb>> {
        let db = PgvectorVectorDb::connect(&config.pgvector, &config.collection_prefix)?;
        Ok(Arc::new(db))
    }
}

struct MemoryFactory;

impl BackendFactory for MemoryFactory {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["inmemory", "ephemeral"]
    }

    fn create(&self, config: &VectorDbConfig) -> Result<Arc<dyn VectorDb>> {
        Ok(Arc::new(MemoryVectorDb::new(&config.collection_prefix)))
    }
}
