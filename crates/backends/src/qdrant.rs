//! Qdrant adapter (REST API).
//!
//! Point/payload model: each item is a point whose payload is the envelope
//! `{"id": .., "text": .., "metadata": {..}}`. Filters address
//! `metadata.<key>`.
//!
//! Qdrant only accepts unsigned integers and UUIDs as point ids. All-digit
//! ids are sent as integers, UUIDs as themselves, and any other id as a
//! UUIDv5 derived from it. The caller's id always rides in the payload and
//! is what reads hand back.

use crate::http::{HttpResponse, HttpTransport};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;
use veclayer_core::normalize::{self, ScoredPoint, StoredPoint};
use veclayer_core::{
    resolve_limit, validate_batch, validate_collection_name, CollectionNamer, DeleteSelector,
    GetResult, JsonScalar, MetadataFilter, ReadOutcome, SearchResult, VectorDb, VectorDbError,
    VectorDbResult, VectorItem,
};

const BACKEND: &str = "qdrant";

/// Points fetched per scroll request.
const SCROLL_PAGE: usize = 256;

/// Qdrant connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    /// REST endpoint
    pub url: String,
    /// Sent as the `api-key` header
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        QdrantConfig {
            url: "http://localhost:6333".to_string(),
            api_key: None,
            timeout_secs: 5,
        }
    }
}

/// `VectorDb` over Qdrant.
#[derive(Debug, Clone)]
pub struct QdrantVectorDb {
    http: HttpTransport,
    namer: CollectionNamer,
}

impl QdrantVectorDb {
    /// Build a client. No request is made until the first operation.
    pub fn new(config: &QdrantConfig, prefix: &str) -> Self {
        let mut http = HttpTransport::new(
            BACKEND,
            &config.url,
            Duration::from_secs(config.timeout_secs),
        );
        if let Some(key) = &config.api_key {
            http = http.with_header("api-key", key);
        }
        QdrantVectorDb {
            http,
            namer: CollectionNamer::new(prefix),
        }
    }

    fn collection_path(&self, name: &str) -> String {
        format!("/collections/{}", self.namer.prefixed(name))
    }

    fn ensure_collection(&self, name: &str, dimension: usize) -> VectorDbResult<()> {
        if self.has_collection(name)? {
            return Ok(());
        }
        let body = json!({"vectors": {"size": dimension, "distance": "Cosine"}});
        let resp = self.http.put(&self.collection_path(name), &body)?;
        if resp.is_success() {
            tracing::info!(backend = BACKEND, collection = name, dimension, "created collection");
            return Ok(());
        }
        // A concurrent writer created it first.
        if resp.status == 409 || resp.error_message().contains("already exists") {
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
        let body = search_batch_body(vectors, limit);
        let path = format!("{}/points/search/batch", self.collection_path(name));
        let resp = self.http.post(&path, &body)?;
        let Some(result) = found_result(resp)? else {
            return Ok(None);
        };
        let batches = result
            .as_array()
            .ok_or_else(|| VectorDbError::Serialization("search result is not an array".into()))?;
        let rows = batches
            .iter()
            .map(|hits| {
                hits.as_array()
                    .map(Vec::as_slice)
                    .unwrap_or(&[])
                    .iter()
                    .map(scored_point)
                    .collect::<VectorDbResult<Vec<_>>>()
            })
            .collect::<VectorDbResult<Vec<_>>>()?;
        Ok(Some(normalize::search_result(rows)))
    }

    fn scroll(
        &self,
        name: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> VectorDbResult<Option<GetResult>> {
        if validate_collection_name(name).is_err() {
            return Ok(None);
        }
        let path = format!("{}/points/scroll", self.collection_path(name));
        let mut points = Vec::new();
        let mut offset = Value::Null;
        loop {
            let page = SCROLL_PAGE.min(limit.saturating_sub(points.len()));
            let body = scroll_body(filter, page, &offset);
            let resp = self.http.post(&path, &body)?;
            let Some(result) = found_result(resp)? else {
                return Ok(None);
            };
            if let Some(batch) = result.get("points").and_then(Value::as_array) {
                for p in batch {
                    points.push(StoredPoint::from_envelope(caller_id(p), p.get("payload"))?);
                }
            }
            offset = result.get("next_page_offset").cloned().unwrap_or(Value::Null);
            if offset.is_null() || points.len() >= limit {
                break;
            }
        }
        // A server may overfill the last page.
        points.truncate(limit);
        Ok(Some(normalize::get_result(points)))
    }
}

/// Unwrap `result` from a Qdrant answer; `None` on 404.
fn found_result(resp: HttpResponse) -> VectorDbResult<Option<Value>> {
    if resp.status == 404 {
        return Ok(None);
    }
    let body = resp.into_success(BACKEND)?;
    Ok(Some(body.get("result").cloned().unwrap_or(Value::Null)))
}

fn scored_point(hit: &Value) -> VectorDbResult<ScoredPoint> {
    let score = hit.get("score").and_then(Value::as_f64).unwrap_or_default() as f32;
    ScoredPoint::from_envelope(caller_id(hit), score, hit.get("payload"))
}

/// The id the caller wrote: `payload.id` when present, else the point id.
fn caller_id(point: &Value) -> &Value {
    point
        .pointer("/payload/id")
        .filter(|id| id.is_string())
        .or_else(|| point.get("id"))
        .unwrap_or(&Value::Null)
}

/// Map a caller id onto an id Qdrant accepts.
///
/// All-digit ids that fit a `u64` become integers and UUIDs pass through.
/// Anything else becomes a UUIDv5 of the id, so the mapping is stable across
/// processes and deletes by id reach the same point.
pub fn point_id(id: &str) -> Value {
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = id.parse::<u64>() {
            return json!(n);
        }
    }
    if Uuid::parse_str(id).is_ok() {
        return json!(id);
    }
    json!(Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string())
}

/// Translate an equality filter into a Qdrant `must` clause list.
pub fn translate_filter(filter: &MetadataFilter) -> Value {
    let must: Vec<Value> = filter
        .iter()
        .map(|(key, value)| {
            let field = format!("metadata.{}", key);
            match value {
                JsonScalar::Null => json!({"is_null": {"key": field}}),
                // Qdrant cannot match floats by value.
                JsonScalar::Float(f) => json!({"key": field, "range": {"gte": f, "lte": f}}),
                other => json!({"key": field, "match": {"value": other.to_json()}}),
            }
        })
        .collect();
    json!({ "must": must })
}

/// Request body for `/points/upsert`.
pub fn upsert_body(items: &[VectorItem]) -> Value {
    let points: Vec<Value> = items
        .iter()
        .map(|item| {
            json!({
                "id": point_id(&item.id),
                "vector": item.vector,
                "payload": {"id": item.id, "text": item.text, "metadata": item.metadata},
            })
        })
        .collect();
    json!({ "points": points })
}

/// Request body for `/points/search/batch`.
pub fn search_batch_body(vectors: &[Vec<f32>], limit: usize) -> Value {
    let searches: Vec<Value> = vectors
        .iter()
        .map(|v| json!({"vector": v, "limit": limit, "with_payload": true}))
        .collect();
    json!({ "searches": searches })
}

fn scroll_body(filter: Option<&MetadataFilter>, page: usize, offset: &Value) -> Value {
    let mut body = json!({"limit": page, "with_payload": true, "with_vector": false});
    if let Some(f) = filter.filter(|f| !f.is_empty()) {
        body["filter"] = translate_filter(f);
    }
    if !offset.is_null() {
        body["offset"] = offset.clone();
    }
    body
}

/// Request body for `/points/delete`.
pub fn delete_body(selector: &DeleteSelector) -> Value {
    match selector {
        DeleteSelector::Ids(ids) => {
            json!({"points": ids.iter().map(|id| point_id(id)).collect::<Vec<_>>()})
        }
        DeleteSelector::Filter(f) => json!({"filter": translate_filter(f)}),
    }
}

impl VectorDb for QdrantVectorDb {
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
        let resp = self.http.get(&format!("{}/exists", self.collection_path(name)))?;
        let body = resp.into_success(BACKEND)?;
        Ok(body
            .pointer("/result/exists")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    fn delete_collection(&self, name: &str) -> VectorDbResult<()> {
        if validate_collection_name(name).is_err() {
            return Ok(());
        }
        let resp = self.http.delete(&self.collection_path(name))?;
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
        self.ensure_collection(name, dimension)?;
        let path = format!("{}/points?wait=true", self.collection_path(name));
        self.http.put(&path, &upsert_body(items))?.into_success(BACKEND)?;
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
        let result = self.scroll(name, Some(filter), resolve_limit(limit));
        ReadOutcome::from_read(BACKEND, "query", name, result)
    }

    fn get(&self, name: &str) -> ReadOutcome<GetResult> {
        let result = self.scroll(name, None, resolve_limit(None));
        ReadOutcome::from_read(BACKEND, "get", name, result)
    }

    fn delete(&self, name: &str, selector: &DeleteSelector) -> VectorDbResult<()> {
        selector.validate()?;
        if validate_collection_name(name).is_err() {
            return Ok(());
        }
        let path = format!("{}/points/delete?wait=true", self.collection_path(name));
        let resp = self.http.post(&path, &delete_body(selector))?;
        if resp.status == 404 {
            return Ok(());
        }
        resp.into_success(BACKEND)?;
        tracing::debug!(backend = BACKEND, collection = name, "deleted points");
        Ok(())
    }

    fn list_collections(&self) -> VectorDbResult<Vec<String>> {
        let body = self.http.get("/collections")?.into_success(BACKEND)?;
        let mut names: Vec<String> = body
            .pointer("/result/collections")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .filter_map(|c| c.get("name").and_then(Value::as_str))
            .filter_map(|n| self.namer.logical_name(n))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }
}
