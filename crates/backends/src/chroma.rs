//! Chroma adapter (REST API v2).
//!
//! Collections are addressed by name for lookup and drop, and by server id
//! for everything else, so most operations first resolve the name. Results
//! come back column-oriented and are zipped by the normalizer.

use crate::http::{HttpResponse, HttpTransport};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use veclayer_core::normalize::{self, ScoredPoint};
use veclayer_core::{
    resolve_limit, validate_batch, validate_collection_name, CollectionNamer, DeleteSelector,
    GetResult, JsonScalar, MetadataFilter, ReadOutcome, SearchResult, VectorDb, VectorDbError,
    VectorDbResult, VectorItem, NO_LIMIT,
};

const BACKEND: &str = "chroma";

/// Collections fetched per list request.
const LIST_PAGE: usize = 100;

/// Chroma connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaConfig {
    /// HTTP endpoint
    pub url: String,
    /// Tenant name
    pub tenant: String,
    /// Database name
    pub database: String,
    /// Sent as the `x-chroma-token` header
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        ChromaConfig {
            url: "http://localhost:8000".to_string(),
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// `VectorDb` over Chroma.
#[derive(Debug, Clone)]
pub struct ChromaVectorDb {
    http: HttpTransport,
    namer: CollectionNamer,
    base: String,
}

impl ChromaVectorDb {
    /// Build a client. No request is made until the first operation.
    pub fn new(config: &ChromaConfig, prefix: &str) -> Self {
        let mut http = HttpTransport::new(
            BACKEND,
            &config.url,
            Duration::from_secs(config.timeout_secs),
        );
        if let Some(key) = &config.api_key {
            http = http.with_header("x-chroma-token", key);
        }
        ChromaVectorDb {
            http,
            namer: CollectionNamer::new(prefix),
            base: format!(
                "/api/v2/tenants/{}/databases/{}/collections",
                config.tenant, config.database
            ),
        }
    }

    /// Resolve a logical name to the server's collection id.
    fn collection_id(&self, name: &str) -> VectorDbResult<Option<String>> {
        if validate_collection_name(name).is_err() {
            return Ok(None);
        }
        let resp = self
            .http
            .get(&format!("{}/{}", self.base, self.namer.prefixed(name)))?;
        if is_not_found(&resp) {
            return Ok(None);
        }
        let body = resp.into_success(BACKEND)?;
        collection_id_of(&body).map(Some)
    }

    fn get_or_create(&self, name: &str) -> VectorDbResult<String> {
        let body = json!({
            "name": self.namer.prefixed(name),
            "metadata": {"hnsw:space": "cosine"},
            "get_or_create": true,
        });
        let created = self.http.post(&self.base, &body)?.into_success(BACKEND)?;
        tracing::debug!(backend = BACKEND, collection = name, "get_or_create collection");
        collection_id_of(&created)
    }

    fn count(&self, id: &str) -> VectorDbResult<usize> {
        let body = self
            .http
            .get(&format!("{}/{}/count", self.base, id))?
            .into_success(BACKEND)?;
        body.as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| VectorDbError::Serialization(format!("count is not a number: {}", body)))
    }

    fn search_inner(
        &self,
        name: &str,
        vectors: &[Vec<f32>],
        limit: usize,
    ) -> VectorDbResult<Option<SearchResult>> {
        let Some(id) = self.collection_id(name)? else {
            return Ok(None);
        };
        // Chroma rejects n_results above the collection size.
        let n_results = if limit == NO_LIMIT {
            self.count(&id)?
        } else {
            limit
        };
        if n_results == 0 || vectors.is_empty() {
            let rows = vectors.iter().map(|_| Vec::new()).collect();
            return Ok(Some(normalize::search_result(rows)));
        }
        let body = json!({
            "query_embeddings": vectors,
            "n_results": n_results,
            "include": ["documents", "metadatas", "distances"],
        });
        let resp = self
            .http
            .post(&format!("{}/{}/query", self.base, id), &body)?
            .into_success(BACKEND)?;
        Ok(Some(normalize::search_result(query_rows(&resp)?)))
    }

    fn get_inner(
        &self,
        name: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> VectorDbResult<Option<GetResult>> {
        let Some(id) = self.collection_id(name)? else {
            return Ok(None);
        };
        let mut body = json!({"include": ["documents", "metadatas"]});
        if let Some(f) = filter.filter(|f| !f.is_empty()) {
            body["where"] = translate_filter(f)?;
        }
        if limit != NO_LIMIT {
            body["limit"] = json!(limit);
        }
        let resp = self
            .http
            .post(&format!("{}/{}/get", self.base, id), &body)?
            .into_success(BACKEND)?;
        let ids = resp
            .get("ids")
            .and_then(Value::as_array)
            .ok_or_else(|| VectorDbError::Serialization("get response has no ids".into()))?;
        let points = normalize::columns(
            ids,
            resp.get("documents").and_then(Value::as_array),
            resp.get("metadatas").and_then(Value::as_array),
        )?;
        Ok(Some(normalize::get_result(points)))
    }
}

fn is_not_found(resp: &HttpResponse) -> bool {
    if resp.status == 404 {
        return true;
    }
    // Older servers answer a missing collection with 400/500 and a message.
    !resp.is_success() && resp.error_message().contains("does not exist")
}

fn collection_id_of(body: &Value) -> VectorDbResult<String> {
    body.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| VectorDbError::Serialization(format!("collection has no id: {}", body)))
}

/// Translate an equality filter into a Chroma `where` document.
///
/// Chroma metadata cannot hold null, so a null condition is rejected.
pub fn translate_filter(filter: &MetadataFilter) -> VectorDbResult<Value> {
    let mut clauses = Vec::with_capacity(filter.len());
    for (key, value) in filter.iter() {
        if matches!(value, JsonScalar::Null) {
            return Err(VectorDbError::invalid_input(format!(
                "chroma cannot filter '{}' on null",
                key
            )));
        }
        clauses.push(json!({ key.as_str(): {"$eq": value.to_json()} }));
    }
    Ok(match clauses.len() {
        1 => clauses.remove(0),
        _ => json!({ "$and": clauses }),
    })
}

/// Request body for `/upsert`. Empty metadata is sent as null.
pub fn upsert_body(items: &[VectorItem]) -> Value {
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    let embeddings: Vec<&Vec<f32>> = items.iter().map(|i| &i.vector).collect();
    let documents: Vec<&str> = items.iter().map(|i| i.text.as_str()).collect();
    let metadatas: Vec<Value> = items
        .iter()
        .map(|i| {
            if i.metadata.is_empty() {
                Value::Null
            } else {
                Value::Object(i.metadata.clone())
            }
        })
        .collect();
    json!({
        "ids": ids,
        "embeddings": embeddings,
        "documents": documents,
        "metadatas": metadatas,
    })
}

/// Request body for `/delete`.
pub fn delete_body(selector: &DeleteSelector) -> VectorDbResult<Value> {
    match selector {
        DeleteSelector::Ids(ids) => Ok(json!({ "ids": ids })),
        DeleteSelector::Filter(f) => Ok(json!({ "where": translate_filter(f)? })),
    }
}

/// Decode a `/query` answer into scored rows.
pub fn query_rows(resp: &Value) -> VectorDbResult<Vec<Vec<ScoredPoint>>> {
    let ids = resp
        .get("ids")
        .and_then(Value::as_array)
        .ok_or_else(|| VectorDbError::Serialization("query response has no ids".into()))?;
    let column = |name: &str, row: usize| -> Option<&Vec<Value>> {
        resp.get(name)
            .and_then(Value::as_array)
            .and_then(|rows| rows.get(row))
            .and_then(Value::as_array)
    };
    ids.iter()
        .enumerate()
        .map(|(row, row_ids)| {
            let row_ids = row_ids.as_array().map(Vec::as_slice).unwrap_or(&[]);
            let stored = normalize::columns(row_ids, column("documents", row), column("metadatas", row))?;
            let distances = column("distances", row);
            Ok(stored
                .into_iter()
                .enumerate()
                .map(|(i, p)| ScoredPoint {
                    id: p.id,
                    score: distances
                        .and_then(|d| d.get(i))
                        .and_then(Value::as_f64)
                        .unwrap_or_default() as f32,
                    text: p.text,
                    metadata: p.metadata,
                })
                .collect())
        })
        .collect()
}

impl VectorDb for ChromaVectorDb {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn namer(&self) -> &CollectionNamer {
        &self.namer
    }

    fn has_collection(&self, name: &str) -> VectorDbResult<bool> {
        Ok(self.collection_id(name)?.is_some())
    }

    fn delete_collection(&self, name: &str) -> VectorDbResult<()> {
        if validate_collection_name(name).is_err() {
            return Ok(());
        }
        let resp = self
            .http
            .delete(&format!("{}/{}", self.base, self.namer.prefixed(name)))?;
        if is_not_found(&resp) {
            return Ok(());
        }
        resp.into_success(BACKEND)?;
        tracing::info!(backend = BACKEND, collection = name, "dropped collection");
        Ok(())
    }

    fn upsert(&self, name: &str, items: &[VectorItem]) -> VectorDbResult<()> {
        validate_collection_name(name)?;
        validate_batch(items)?;
        let id = self.get_or_create(name)?;
        self.http
            .post(&format!("{}/{}/upsert", self.base, id), &upsert_body(items))?
            .into_success(BACKEND)?;
        tracing::debug!(backend = BACKEND, collection = name, count = items.len(), "upserted");
        Ok(())
    }

    fn search(
        &self,
        name: &str,
        vectors: &[Vec<f32>],
        limit: Option<usize>,
    ) -> ReadOutcome<SearchResult> {
        let result = self.search_inner(name, vectors, resolve_limit(limit));
        ReadOutcome::from_read(BACKEND, "search", name, result)
    }

    fn query(
        &self,
        name: &str,
        filter: &MetadataFilter,
        limit: Option<usize>,
    ) -> ReadOutcome<GetResult> {
        let result = self.get_inner(name, Some(filter), resolve_limit(limit));
        ReadOutcome::from_read(BACKEND, "query", name, result)
    }

    fn get(&self, name: &str) -> ReadOutcome<GetResult> {
        let result = self.get_inner(name, None, NO_LIMIT);
        ReadOutcome::from_read(BACKEND, "get", name, result)
    }

    fn delete(&self, name: &str, selector: &DeleteSelector) -> VectorDbResult<()> {
        selector.validate()?;
        let body = delete_body(selector)?;
        let Some(id) = self.collection_id(name)? else {
            return Ok(());
        };
        self.http
            .post(&format!("{}/{}/delete", self.base, id), &body)?
            .into_success(BACKEND)?;
        tracing::debug!(backend = BACKEND, collection = name, "deleted records");
        Ok(())
    }

    fn list_collections(&self) -> VectorDbResult<Vec<String>> {
        let mut names = Vec::new();
        let mut offset = 0;
        loop {
            let path = format!("{}?limit={}&offset={}", self.base, LIST_PAGE, offset);
            let body = self.http.get(&path)?.into_success(BACKEND)?;
            let page = body
                .as_array()
                .ok_or_else(|| VectorDbError::Serialization("collection list is not an array".into()))?;
            names.extend(
                page.iter()
                    .filter_map(|c| c.get("name").and_then(Value::as_str))
                    .filter_map(|n| self.namer.logical_name(n))
                    .map(str::to_string),
            );
            if page.len() < LIST_PAGE {
                break;
            }
            offset += page.len();
        }
        names.sort();
        Ok(names)
    }
}
