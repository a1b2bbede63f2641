//! OpenSearch adapter (REST API with the k-NN plugin).
//!
//! Each collection is an index created on first upsert with a
//! `knn_vector` field (HNSW, `cosinesimil`) sized to the first batch.
//! A document is `{"id", "vector", "text", "metadata"}` stored under the
//! caller's id as `_id`. String metadata is mapped as `keyword`, so filters
//! are exact `term` clauses on `metadata.<key>`.
//!
//! Index names must be lowercase; the namer folds them.
//!
//! Enumeration pages with `search_after` on the `id` keyword, which keeps
//! every request stateless and under the result window.

use crate::http::{HttpResponse, HttpTransport};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use veclayer_core::normalize::{self, ScoredPoint, StoredPoint};
use veclayer_core::{
    resolve_limit, validate_batch, validate_collection_name, CollectionNamer, DeleteSelector,
    GetResult, JsonScalar, MetadataFilter, ReadOutcome, SearchResult, VectorDb, VectorDbError,
    VectorDbResult, VectorItem,
};

const BACKEND: &str = "opensearch";

/// Largest `size` (and `k`) a single search may ask for.
pub const MAX_RESULT_WINDOW: usize = 10_000;

/// Documents fetched per enumeration request.
const PAGE: usize = 1_000;

/// OpenSearch connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenSearchConfig {
    /// REST endpoint
    pub url: String,
    /// Basic-auth user
    pub username: Option<String>,
    /// Basic-auth password
    pub password: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        OpenSearchConfig {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            timeout_secs: 30,
        }
    }
}

/// `VectorDb` over OpenSearch.
#[derive(Debug, Clone)]
pub struct OpenSearchVectorDb {
    http: HttpTransport,
    namer: CollectionNamer,
}

impl OpenSearchVectorDb {
    /// Build a client. No request is made until the first operation.
    pub fn new(config: &OpenSearchConfig, prefix: &str) -> Self {
        let mut http = HttpTransport::new(
            BACKEND,
            &config.url,
            Duration::from_secs(config.timeout_secs),
        );
        if let Some(user) = &config.username {
            let password = config.password.as_deref().unwrap_or_default();
            http = http.with_header("Authorization", &basic_auth(user, password));
        }
        OpenSearchVectorDb {
            http,
            namer: CollectionNamer::new(prefix).lowercase(),
        }
    }

    fn index_path(&self, name: &str) -> String {
        format!("/{}", self.namer.prefixed(name))
    }

    fn ensure_index(&self, name: &str, dimension: usize) -> VectorDbResult<()> {
        if self.has_collection(name)? {
            return Ok(());
        }
        let resp = self.http.put(&self.index_path(name), &index_body(dimension))?;
        if resp.is_success() {
            tracing::info!(backend = BACKEND, collection = name, dimension, "created collection");
            return Ok(());
        }
        // A concurrent writer created it first.
        if error_type(&resp) == Some("resource_already_exists_exception") {
            tracing::debug!(backend = BACKEND, collection = name, "collection already exists");
            return Ok(());
        }
        resp.into_success(BACKEND).map(|_| ())
    }

    fn search_inner(
        &self,
        name: &str,
        vectors: &[Vec<f32>],
        limit: usize,
    ) -> VectorDbResult<Option<SearchResult>> {
        if validate_collection_name(name).is_err() {
            return Ok(None);
        }
        let path = format!("{}/_search", self.index_path(name));
        let mut rows = Vec::with_capacity(vectors.len());
        for vector in vectors {
            let resp = self.http.post(&path, &knn_body(vector, limit))?;
            let Some(body) = found_body(resp)? else {
                return Ok(None);
            };
            rows.push(
                hits(&body)
                    .iter()
                    .map(scored_hit)
                    .collect::<VectorDbResult<Vec<_>>>()?,
            );
        }
        Ok(Some(normalize::search_result(rows)))
    }

    fn scan(
        &self,
        name: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> VectorDbResult<Option<GetResult>> {
        if validate_collection_name(name).is_err() {
            return Ok(None);
        }
        let path = format!("{}/_search", self.index_path(name));
        let mut points = Vec::new();
        let mut after: Option<Value> = None;
        loop {
            let page = PAGE.min(limit.saturating_sub(points.len()));
            let resp = self.http.post(&path, &scan_body(filter, page, after.as_ref()))?;
            let Some(body) = found_body(resp)? else {
                return Ok(None);
            };
            let batch = hits(&body);
            for hit in batch {
                points.push(StoredPoint::from_envelope(
                    hit.get("_id").unwrap_or(&Value::Null),
                    hit.get("_source"),
                )?);
            }
            after = batch.last().and_then(|h| h.get("sort")).cloned();
            if batch.len() < page || after.is_none() || points.len() >= limit {
                break;
            }
        }
        points.truncate(limit);
        Ok(Some(normalize::get_result(points)))
    }
}

fn basic_auth(user: &str, password: &str) -> String {
    let token = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password));
    format!("Basic {}", token)
}

fn error_type(resp: &HttpResponse) -> Option<&str> {
    resp.body.pointer("/error/type").and_then(Value::as_str)
}

/// Unwrap a search answer; `None` when the index does not exist.
fn found_body(resp: HttpResponse) -> VectorDbResult<Option<Value>> {
    if resp.status == 404 {
        return Ok(None);
    }
    resp.into_success(BACKEND).map(Some)
}

fn hits(body: &Value) -> &[Value] {
    body.pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn scored_hit(hit: &Value) -> VectorDbResult<ScoredPoint> {
    let score = hit.get("_score").and_then(Value::as_f64).unwrap_or_default() as f32;
    ScoredPoint::from_envelope(
        hit.get("_id").unwrap_or(&Value::Null),
        score,
        hit.get("_source"),
    )
}

/// Request body for index creation.
pub fn index_body(dimension: usize) -> Value {
    json!({
        "settings": {"index": {"knn": true}},
        "mappings": {
            "dynamic_templates": [{
                "metadata_strings": {
                    "path_match": "metadata.*",
                    "match_mapping_type": "string",
                    "mapping": {"type": "keyword"},
                }
            }],
            "properties": {
                "id": {"type": "keyword"},
                "vector": {
                    "type": "knn_vector",
                    "dimension": dimension,
                    "method": {"name": "hnsw", "space_type": "cosinesimil", "engine": "lucene"},
                },
                "text": {"type": "text"},
                "metadata": {"type": "object"},
            },
        },
    })
}

/// Translate an equality filter into `bool.filter` clauses.
pub fn translate_filter(filter: &MetadataFilter) -> Value {
    let clauses: Vec<Value> = filter
        .iter()
        .map(|(key, value)| {
            let field = format!("metadata.{}", key);
            match value {
                JsonScalar::Null => {
                    json!({"bool": {"must_not": {"exists": {"field": field}}}})
                }
                other => json!({"term": {field: other.to_json()}}),
            }
        })
        .collect();
    json!({"bool": {"filter": clauses}})
}

/// Request body for one k-NN search.
pub fn knn_body(vector: &[f32], limit: usize) -> Value {
    let k = limit.min(MAX_RESULT_WINDOW);
    json!({
        "size": k,
        "query": {"knn": {"vector": {"vector": vector, "k": k}}},
        "_source": {"excludes": ["vector"]},
    })
}

/// Request body for one enumeration page.
pub fn scan_body(filter: Option<&MetadataFilter>, page: usize, after: Option<&Value>) -> Value {
    let query = match filter.filter(|f| !f.is_empty()) {
        Some(f) => translate_filter(f),
        None => json!({"match_all": {}}),
    };
    let mut body = json!({
        "size": page,
        "query": query,
        "sort": [{"id": "asc"}],
        "_source": {"excludes": ["vector"]},
    });
    if let Some(after) = after {
        body["search_after"] = after.clone();
    }
    body
}

/// `_bulk` lines indexing every item under its caller id.
pub fn bulk_lines(index: &str, items: &[VectorItem]) -> Vec<Value> {
    let mut lines = Vec::with_capacity(items.len() * 2);
    for item in items {
        lines.push(json!({"index": {"_index": index, "_id": item.id}}));
        lines.push(json!({
            "id": item.id,
            "vector": item.vector,
            "text": item.text,
            "metadata": item.metadata,
        }));
    }
    lines
}

/// Request body for `_delete_by_query`.
pub fn delete_body(selector: &DeleteSelector) -> Value {
    match selector {
        DeleteSelector::Ids(ids) => json!({"query": {"ids": {"values": ids}}}),
        DeleteSelector::Filter(f) => json!({"query": translate_filter(f)}),
    }
}

/// First per-item failure in a `_bulk` answer.
fn bulk_failure(body: &Value) -> Option<VectorDbError> {
    if !body.get("errors").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    let items = body.get("items").and_then(Value::as_array)?;
    items.iter().find_map(|entry| {
        let result = entry.get("index")?;
        let error = result.get("error")?;
        let status = result.get("status").and_then(Value::as_u64).unwrap_or(400);
        let reason = error
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("bulk item rejected");
        Some(VectorDbError::backend(BACKEND, status.to_string(), reason))
    })
}

impl VectorDb for OpenSearchVectorDb {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn namer(&self) -> &CollectionNamer {
        &self.namer
    }

    fn has_collection(&self, name: &str) -> VectorDbResult<bool> {
        if validate_collection_name(name).is_err() {
            return Ok(false);
        }
        let resp = self.http.get(&self.index_path(name))?;
        if resp.status == 404 {
            return Ok(false);
        }
        resp.into_success(BACKEND)?;
        Ok(true)
    }

    fn delete_collection(&self, name: &str) -> VectorDbResult<()> {
        if validate_collection_name(name).is_err() {
            return Ok(());
        }
        let resp = self.http.delete(&self.index_path(name))?;
        if resp.status == 404 {
            return Ok(());
        }
        resp.into_success(BACKEND)?;
        tracing::info!(backend = BACKEND, collection = name, "dropped collection");
        Ok(())
    }

    fn upsert(&self, name: &str, items: &[VectorItem]) -> VectorDbResult<()> {
        validate_collection_name(name)?;
        let dimension = validate_batch(items)?;
        self.ensure_index(name, dimension)?;
        let lines = bulk_lines(&self.namer.prefixed(name), items);
        let body = self
            .http
            .post_ndjson("/_bulk?refresh=true", &lines)?
            .into_success(BACKEND)?;
        if let Some(err) = bulk_failure(&body) {
            return Err(err);
        }
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
        let result = self.scan(name, Some(filter), resolve_limit(limit));
        ReadOutcome::from_read(BACKEND, "query", name, result)
    }

    fn get(&self, name: &str) -> ReadOutcome<GetResult> {
        let result = self.scan(name, None, resolve_limit(None));
        ReadOutcome::from_read(BACKEND, "get", name, result)
    }

    fn delete(&self, name: &str, selector: &DeleteSelector) -> VectorDbResult<()> {
        selector.validate()?;
        if validate_collection_name(name).is_err() {
            return Ok(());
        }
        let path = format!("{}/_delete_by_query?refresh=true", self.index_path(name));
        let resp = self.http.post(&path, &delete_body(selector))?;
        if resp.status == 404 {
            return Ok(());
        }
        resp.into_success(BACKEND)?;
        tracing::debug!(backend = BACKEND, collection = name, "deleted documents");
        Ok(())
    }

    fn list_collections(&self) -> VectorDbResult<Vec<String>> {
        let body = self
            .http
            .get("/_cat/indices?format=json")?
            .into_success(BACKEND)?;
        let mut names: Vec<String> = body
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .filter_map(|i| i.get("index").and_then(Value::as_str))
            .filter_map(|n| self.namer.logical_name(n))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }
}
