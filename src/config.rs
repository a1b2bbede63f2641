//! Backend selection and connection settings.
//!
//! Settings are read once, when a [`VectorLayer`](crate::VectorLayer) is
//! built. Sources in order of precedence: explicit builder calls, then
//! environment variables, then a TOML file, then the base configuration
//! (defaults unless one is supplied). The file is overlaid key by key.
//!
//! ```toml
//! backend = "qdrant"
//! collection_prefix = "veclayer"
//!
//! [qdrant]
//! url = "http://localhost:6333"
//! timeout_secs = 5
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;
use veclayer_backends::{
    ChromaConfig, MilvusConfig, OpenSearchConfig, PgvectorConfig, QdrantConfig,
};
use veclayer_core::{validate_collection_name, DEFAULT_PREFIX};

/// Backend used when none is configured or the configured one is unknown.
pub const DEFAULT_BACKEND: &str = "chroma";

/// Environment variable names.
pub mod env {
    /// Backend identifier
    pub const VECTOR_DB: &str = "VECTOR_DB";
    /// Collection name prefix
    pub const COLLECTION_PREFIX: &str = "VECTOR_DB_COLLECTION_PREFIX";

    /// Full Chroma URL; wins over host/port/ssl
    pub const CHROMA_HTTP_URL: &str = "CHROMA_HTTP_URL";
    /// Chroma host
    pub const CHROMA_HTTP_HOST: &str = "CHROMA_HTTP_HOST";
    /// Chroma port
    pub const CHROMA_HTTP_PORT: &str = "CHROMA_HTTP_PORT";
    /// Use https for Chroma
    pub const CHROMA_HTTP_SSL: &str = "CHROMA_HTTP_SSL";
    /// Chroma tenant
    pub const CHROMA_TENANT: &str = "CHROMA_TENANT";
    /// Chroma database
    pub const CHROMA_DATABASE: &str = "CHROMA_DATABASE";
    /// Chroma token
    pub const CHROMA_API_KEY: &str = "CHROMA_API_KEY";
    /// Chroma request timeout
    pub const CHROMA_TIMEOUT_SECONDS: &str = "CHROMA_TIMEOUT_SECONDS";

    /// Qdrant URL
    pub const QDRANT_URL: &str = "QDRANT_URL";
    /// Qdrant API key
    pub const QDRANT_API_KEY: &str = "QDRANT_API_KEY";
    /// Qdrant request timeout
    pub const QDRANT_TIMEOUT_SECONDS: &str = "QDRANT_TIMEOUT_SECONDS";

    /// Milvus URL
    pub const MILVUS_URI: &str = "MILVUS_URI";
    /// Milvus token
    pub const MILVUS_TOKEN: &str = "MILVUS_TOKEN";
    /// Milvus database
    pub const MILVUS_DB: &str = "MILVUS_DB";
    /// Milvus request timeout
    pub const MILVUS_TIMEOUT_SECONDS: &str = "MILVUS_TIMEOUT_SECONDS";

    /// OpenSearch URL
    pub const OPENSEARCH_URI: &str = "OPENSEARCH_URI";
    /// OpenSearch basic-auth user
    pub const OPENSEARCH_USERNAME: &str = "OPENSEARCH_USERNAME";
    /// OpenSearch basic-auth password
    pub const OPENSEARCH_PASSWORD: &str = "OPENSEARCH_PASSWORD";
    /// OpenSearch request timeout
    pub const OPENSEARCH_TIMEOUT_SECONDS: &str = "OPENSEARCH_TIMEOUT_SECONDS";

    /// Postgres connection string
    pub const PGVECTOR_DB_URL: &str = "PGVECTOR_DB_URL";
    /// Postgres pool size
    pub const PGVECTOR_MAX_CONNECTIONS: &str = "PGVECTOR_MAX_CONNECTIONS";
    /// Postgres acquire timeout
    pub const PGVECTOR_TIMEOUT_SECONDS: &str = "PGVECTOR_TIMEOUT_SECONDS";
}

/// Complete vector store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Backend identifier or alias (case-insensitive)
    pub backend: String,
    /// Namespace for every collection this layer creates
    pub collection_prefix: String,
    /// Chroma settings
    pub chroma: ChromaConfig,
    /// Qdrant settings
    pub qdrant: QdrantConfig,
    /// Milvus settings
    pub milvus: MilvusConfig,
    /// OpenSearch settings
    pub opensearch: OpenSearchConfig,
    /// pgvector settings
    pub pgvector: PgvectorConfig,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        VectorDbConfig {
            backend: DEFAULT_BACKEND.to_string(),
            collection_prefix: DEFAULT_PREFIX.to_string(),
            chroma: ChromaConfig::default(),
            qdrant: QdrantConfig::default(),
            milvus: MilvusConfig::default(),
            opensearch: OpenSearchConfig::default(),
            pgvector: PgvectorConfig::default(),
        }
    }
}

impl VectorDbConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.merge_env()?;
        Ok(config)
    }

    /// Parse TOML text. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Overlay TOML text. Keys present in `text` replace ours, tables merge
    /// key by key, and anything the text leaves out is kept.
    ///
    /// # Errors
    /// - `Toml` if the text does not parse
    /// - `Config` if a value has the wrong type for its key
    pub fn merge_toml_str(&mut self, text: &str) -> Result<()> {
        let overlay: Value = toml::from_str(text)?;
        let mut merged = serde_json::to_value(&*self)
            .map_err(|e| Error::Config(format!("cannot represent configuration: {}", e)))?;
        merge_tables(&mut merged, overlay);
        *self = serde_json::from_value(merged)
            .map_err(|e| Error::Config(format!("invalid configuration file: {}", e)))?;
        Ok(())
    }

    /// Overlay a TOML file. See [`merge_toml_str`](Self::merge_toml_str).
    pub fn merge_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let text = std::fs::read_to_string(path.as_ref())?;
        self.merge_toml_str(&text)
    }

    /// Overlay the process environment.
    pub fn merge_env(&mut self) -> Result<()> {
        self.merge_lookup(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`. Empty values count as unset.
    ///
    /// # Errors
    /// - `Config` if a numeric or boolean variable does not parse
    pub fn merge_lookup(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(env::VECTOR_DB) {
            self.backend = v;
        }
        if let Some(v) = get(env::COLLECTION_PREFIX) {
            self.collection_prefix = v;
        }

        if let Some(url) = get(env::CHROMA_HTTP_URL) {
            self.chroma.url = url;
        } else if let Some(host) = get(env::CHROMA_HTTP_HOST) {
            let port: u16 = parse(&get, env::CHROMA_HTTP_PORT)?.unwrap_or(8000);
            let ssl = parse_bool(&get, env::CHROMA_HTTP_SSL)?.unwrap_or(false);
            let scheme = if ssl { "https" } else { "http" };
            self.chroma.url = format!("{}://{}:{}", scheme, host, port);
        }
        if let Some(v) = get(env::CHROMA_TENANT) {
            self.chroma.tenant = v;
        }
        if let Some(v) = get(env::CHROMA_DATABASE) {
            self.chroma.database = v;
        }
        if let Some(v) = get(env::CHROMA_API_KEY) {
            self.chroma.api_key = Some(v);
        }
        if let Some(v) = parse(&get, env::CHROMA_TIMEOUT_SECONDS)? {
            self.chroma.timeout_secs = v;
        }

        if let Some(v) = get(env::QDRANT_URL) {
            self.qdrant.url = v;
        }
        if let Some(v) = get(env::QDRANT_API_KEY) {
            self.qdrant.api_key = Some(v);
        }
        if let Some(v) = parse(&get, env::QDRANT_TIMEOUT_SECONDS)? {
            self.qdrant.timeout_secs = v;
        }

        if let Some(v) = get(env::MILVUS_URI) {
            self.milvus.url = v;
        }
        if let Some(v) = get(env::MILVUS_TOKEN) {
            self.milvus.token = Some(v);
        }
        if let Some(v) = get(env::MILVUS_DB) {
            self.milvus.database = v;
        }
        if let Some(v) = parse(&get, env::MILVUS_TIMEOUT_SECONDS)? {
            self.milvus.timeout_secs = v;
        }

        if let Some(v) = get(env::OPENSEARCH_URI) {
            self.opensearch.url = v;
        }
        if let Some(v) = get(env::OPENSEARCH_USERNAME) {
            self.opensearch.username = Some(v);
        }
        if let Some(v) = get(env::OPENSEARCH_PASSWORD) {
            self.opensearch.password = Some(v);
        }
        if let Some(v) = parse(&get, env::OPENSEARCH_TIMEOUT_SECONDS)? {
            self.opensearch.timeout_secs = v;
        }

        if let Some(v) = get(env::PGVECTOR_DB_URL) {
            self.pgvector.url = v;
        }
        if let Some(v) = parse(&get, env::PGVECTOR_MAX_CONNECTIONS)? {
            self.pgvector.max_connections = v;
        }
        if let Some(v) = parse(&get, env::PGVECTOR_TIMEOUT_SECONDS)? {
            self.pgvector.timeout_secs = v;
        }
        Ok(())
    }

    /// Check values that no backend can work with.
    pub fn validate(&self) -> Result<()> {
        validate_collection_name(&self.collection_prefix).map_err(|_| {
            Error::Config(format!(
                "collection prefix '{}' must be non-empty ASCII letters, digits, '_', '-' or '.'",
                self.collection_prefix
            ))
        })?;
        let timeouts = [
            ("chroma", self.chroma.timeout_secs),
            ("qdrant", self.qdrant.timeout_secs),
            ("milvus", self.milvus.timeout_secs),
            ("opensearch", self.opensearch.timeout_secs),
            ("pgvector", self.pgvector.timeout_secs),
        ];
        if let Some((backend, _)) = timeouts.iter().find(|(_, t)| *t == 0) {
            return Err(Error::Config(format!("{} timeout must be positive", backend)));
        }
        if self.pgvector.max_connections == 0 {
            return Err(Error::Config("pgvector max_connections must be positive".into()));
        }
        Ok(())
    }
}

fn merge_tables(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_tables(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn parse<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{}: invalid value '{}'", key, raw))),
    }
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(Error::Config(format!("{}: invalid boolean '{}'", key, v))),
        },
    }
}
