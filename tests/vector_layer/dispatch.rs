//! Dispatch Tests
//!
//! Backend selection through the registry and builder.

use crate::*;
use std::io::Write;
use std::sync::Arc;
use veclayer_backends::MemoryVectorDb;

#[test]
fn test_aliases_resolve_to_memory() {
    for alias in ["memory", "InMemory", "EPHEMERAL"] {
        let layer = VectorLayer::builder()
            .backend(alias)
            .without_env()
            .build()
            .unwrap();
        assert_eq!(layer.backend_name(), "memory");
    }
}

#[test]
fn test_unknown_backend_uses_chroma() {
    let layer = VectorLayer::builder()
        .backend("no-such-engine")
        .without_env()
        .build()
        .unwrap();
    assert_eq!(layer.backend_name(), "chroma");
}

#[test]
fn test_unreachable_backend_reads_are_unavailable() {
    let config = VectorDbConfig::from_toml_str(
        r#"
        backend = "qdrant"

        [qdrant]
        url = "http://127.0.0.1:1"
        timeout_secs = 1
        "#,
    )
    .unwrap();
    let layer = VectorLayer::from_config(&config).unwrap();
    assert_eq!(layer.backend_name(), "qdrant");

    assert!(layer.get("docs").is_unavailable());
    assert!(layer.upsert("docs", &pets()).unwrap_err().is_unavailable());
}

#[test]
fn test_config_file_selects_backend() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "backend = \"memory\"\ncollection_prefix = \"filed\"").unwrap();
    let layer = VectorLayer::builder()
        .config_file(file.path())
        .without_env()
        .build()
        .unwrap();
    layer.upsert("docs", &pets()).unwrap();
    assert_eq!(layer.namer().prefixed("docs"), "filed_docs");
}

struct CountingFactory {
    created: Arc<parking_lot::Mutex<usize>>,
}

impl BackendFactory for CountingFactory {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn create(&self, config: &VectorDbConfig) -> veclayer::Result<Arc<dyn VectorDb>> {
        *self.created.lock() += 1;
        Ok(Arc::new(MemoryVectorDb::new(&config.collection_prefix)))
    }
}

#[test]
fn test_custom_factory_is_injected() {
    let created = Arc::new(parking_lot::Mutex::new(0));
    let mut registry = BackendRegistry::with_defaults();
    registry.register(Arc::new(CountingFactory {
        created: Arc::clone(&created),
    }));

    let layer = VectorLayer::builder()
        .registry(registry)
        .backend("counting")
        .without_env()
        .build()
        .unwrap();
    let clone = layer.clone();
    clone.upsert("docs", &pets()).unwrap();

    assert_eq!(*created.lock(), 1);
    assert!(layer.has_collection("docs").unwrap());
}
