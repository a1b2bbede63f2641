//! The vector layer handle.
//!
//! [`VectorLayer`] is the single entry point callers hold. It wraps exactly
//! one backend adapter chosen at build time and is cheap to clone, so one
//! handle can be shared by every request handler.

use crate::config::VectorDbConfig;
use crate::error::Result;
use crate::registry::BackendRegistry;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use veclayer_backends::MemoryVectorDb;
use veclayer_core::{
    CollectionNamer, DeleteSelector, GetResult, MetadataFilter, ReadOutcome, SearchResult,
    VectorDb, VectorItem,
};

/// Handle to the configured vector store.
///
/// Create one with [`VectorLayer::from_env`], [`VectorLayer::builder`] or
/// [`VectorLayer::ephemeral`], clone it into callers, and call
/// [`close`](VectorLayer::close) at shutdown.
///
/// # Example
///
/// ```ignore
/// use veclayer::prelude::*;
///
/// let layer = VectorLayer::ephemeral();
/// layer.upsert("docs", &[VectorItem::new("a", vec![0.0, 1.0], "cat")])?;
///
/// let hits = layer.search("docs", &[vec![0.0, 1.0]], Some(1));
/// if let Some(result) = hits.into_option() {
///     println!("{:?}", result.first_ids());
/// }
/// ```
#[derive(Clone)]
pub struct VectorLayer {
    db: Arc<dyn VectorDb>,
}

impl fmt::Debug for VectorLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorLayer")
            .field("backend", &self.db.backend_name())
            .field("prefix", &self.db.namer().prefix())
            .finish()
    }
}

impl VectorLayer {
    /// Build from defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        Self::builder().build()
    }

    /// Build from an explicit configuration. The environment is not read.
    pub fn from_config(config: &VectorDbConfig) -> Result<Self> {
        Self::builder().config(config.clone()).without_env().build()
    }

    /// In-process layer with no server and nothing persisted.
    ///
    /// Data is lost when the last clone is dropped.
    pub fn ephemeral() -> Self {
        let db = MemoryVectorDb::new(veclayer_core::DEFAULT_PREFIX);
        Self::from_backend(Arc::new(db))
    }

    /// Wrap an adapter built elsewhere.
    pub fn from_backend(db: Arc<dyn VectorDb>) -> Self {
        VectorLayer { db }
    }

    /// Create a builder.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let layer = VectorLayer::builder()
    ///     .config_file("veclayer.toml")
    ///     .backend("qdrant")
    ///     .build()?;
    /// ```
    pub fn builder() -> VectorLayerBuilder {
        VectorLayerBuilder::new()
    }

    /// The adapter behind this handle.
    pub fn backend(&self) -> &Arc<dyn VectorDb> {
        &self.db
    }

    /// Canonical name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        self.db.backend_name()
    }

    /// Naming policy in effect.
    pub fn namer(&self) -> &CollectionNamer {
        self.db.namer()
    }

    /// See [`VectorDb::has_collection`].
    pub fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.db.has_collection(name)?)
    }

    /// See [`VectorDb::delete_collection`].
    pub fn delete_collection(&self, name: &str) -> Result<()> {
        Ok(self.db.delete_collection(name)?)
    }

    /// See [`VectorDb::upsert`].
    pub fn upsert(&self, name: &str, items: &[VectorItem]) -> Result<()> {
        Ok(self.db.upsert(name, items)?)
    }

    /// See [`VectorDb::insert`].
    pub fn insert(&self, name: &str, items: &[VectorItem]) -> Result<()> {
        Ok(self.db.insert(name, items)?)
    }

    /// See [`VectorDb::search`].
    pub fn search(
        &self,
        name: &str,
        vectors: &[Vec<f32>],
        limit: Option<usize>,
    ) -> ReadOutcome<SearchResult> {
        self.db.search(name, vectors, limit)
    }

    /// See [`VectorDb::query`].
    pub fn query(
        &self,
        name: &str,
        filter: &MetadataFilter,
        limit: Option<usize>,
    ) -> ReadOutcome<GetResult> {
        self.db.query(name, filter, limit)
    }

    /// See [`VectorDb::get`].
    pub fn get(&self, name: &str) -> ReadOutcome<GetResult> {
        self.db.get(name)
    }

    /// See [`VectorDb::delete`].
    pub fn delete(&self, name: &str, selector: &DeleteSelector) -> Result<()> {
        Ok(self.db.delete(name, selector)?)
    }

    /// See [`VectorDb::list_collections`].
    pub fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.db.list_collections()?)
    }

    /// Drop every collection carrying this layer's prefix.
    ///
    /// Destructive. Never called implicitly.
    pub fn reset(&self) -> Result<()> {
        Ok(self.db.reset()?)
    }

    /// Release backend connections.
    ///
    /// Every clone shares the adapter, so close once at shutdown.
    pub fn close(&self) -> Result<()> {
        tracing::debug!(backend = self.backend_name(), "closing vector layer");
        Ok(self.db.close()?)
    }
}

/// Builder for a [`VectorLayer`].
///
/// Precedence, highest first: builder overrides, environment, config file,
/// base configuration.
#[derive(Debug)]
pub struct VectorLayerBuilder {
    config: VectorDbConfig,
    config_file: Option<PathBuf>,
    backend: Option<String>,
    prefix: Option<String>,
    read_env: bool,
    registry: BackendRegistry,
}

impl Default for VectorLayerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorLayerBuilder {
    /// Builder with default configuration that reads the environment.
    pub fn new() -> Self {
        VectorLayerBuilder {
            config: VectorDbConfig::default(),
            config_file: None,
            backend: None,
            prefix: None,
            read_env: true,
            registry: BackendRegistry::with_defaults(),
        }
    }

    /// Base configuration, replacing the defaults.
    pub fn config(mut self, config: VectorDbConfig) -> Self {
        self.config = config;
        self
    }

    /// Overlay a TOML file on the base configuration. Keys the file does
    /// not set keep their base values.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Force the backend, ignoring file and environment.
    pub fn backend(mut self, name: impl Into<String>) -> Self {
        self.backend = Some(name.into());
        self
    }

    /// Force the collection prefix.
    pub fn collection_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Do not read environment variables.
    pub fn without_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    /// Use a custom registry.
    pub fn registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Resolve the final configuration without building an adapter.
    pub fn resolve_config(&self) -> Result<VectorDbConfig> {
        let mut config = self.config.clone();
        if let Some(path) = &self.config_file {
            config.merge_file(path)?;
        }
        if self.read_env {
            config.merge_env()?;
        }
        if let Some(backend) = &self.backend {
            config.backend = backend.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.collection_prefix = prefix.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// Build the layer.
    ///
    /// # Errors
    ///
    /// - `Io` / `Toml`: the config file cannot be read or parsed
    /// - `Config`: a setting is invalid
    /// - backend errors from adapters that connect eagerly
    pub fn build(self) -> Result<VectorLayer> {
        let config = self.resolve_config()?;
        let db = self.registry.create(&config)?;
        tracing::info!(
            backend = db.backend_name(),
            prefix = %config.collection_prefix,
            "vector layer ready"
        );
        Ok(VectorLayer::from_backend(db))
    }
}
