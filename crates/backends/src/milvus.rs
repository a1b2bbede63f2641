//! Milvus adapter (RESTful API v2).
//!
//! Each collection has a fixed schema: `id` VarChar primary key, `vector`
//! FloatVector, `text` VarChar and `metadata` JSON, with a COSINE AUTOINDEX.
//! Filters are boolean expressions over `metadata["key"]`.
//!
//! Milvus answers most failures with HTTP 200 and a non-zero `code`, so
//! every response goes through [`MilvusVectorDb::call`].

use crate::http::HttpTransport;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use veclayer_core::normalize::{self, ScoredPoint, StoredPoint};
use veclayer_core::{
    resolve_limit, validate_batch, validate_collection_name, CollectionNamer, DeleteSelector,
    GetResult, JsonScalar, MetadataFilter, ReadOutcome, SearchResult, VectorDb, VectorDbError,
    VectorDbResult, VectorItem,
};

const BACKEND: &str = "milvus";

/// Largest `limit` Milvus accepts for search and query.
pub const MAX_LIMIT: usize = 16_384;

/// VarChar capacity for `id` and `text`.
const MAX_VARCHAR: usize = 65_535;

const OUTPUT_FIELDS: [&str; 3] = ["id", "text", "metadata"];

/// Milvus connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilvusConfig {
    /// REST endpoint
    pub url: String,
    /// Sent as a bearer token (`user:password` or an API key)
    pub token: Option<String>,
    /// Database name
    pub database: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for MilvusConfig {
    fn default() -> Self {
        MilvusConfig {
            url: "http://localhost:19530".to_string(),
            token: None,
            database: "default".to_string(),
            timeout_secs: 30,
        }
    }
}

/// `VectorDb` over Milvus.
#[derive(Debug, Clone)]
pub struct MilvusVectorDb {
    http: HttpTransport,
    namer: CollectionNamer,
    database: String,
}

/// A Milvus `code != 0` answer.
#[derive(Debug)]
enum MilvusFailure {
    NotFound,
    AlreadyExists,
    Other(VectorDbError),
}

impl MilvusVectorDb {
    /// Build a client. No request is made until the first operation.
    pub fn new(config: &MilvusConfig, prefix: &str) -> Self {
        let mut http = HttpTransport::new(
            BACKEND,
            &config.url,
            Duration::from_secs(config.timeout_secs),
        );
        if let Some(token) = &config.token {
            http = http.with_header("Authorization", &format!("Bearer {}", token));
        }
        MilvusVectorDb {
            http,
            namer: CollectionNamer::new(prefix).identifier_safe(),
            database: config.database.clone(),
        }
    }

    /// POST to a v2 endpoint and unwrap `data`.
    ///
    /// The outer error is transport failure; the inner one is a Milvus
    /// rejection, classified so callers can treat absence as they need.
    fn call(&self, endpoint: &str, mut body: Value) -> VectorDbResult<Result<Value, MilvusFailure>> {
        body["dbName"] = json!(self.database);
        let resp = self.http.post(&format!("/v2/vectordb/{}", endpoint), &body)?;
        if !resp.is_success() {
            let err = VectorDbError::backend(BACKEND, resp.status.to_string(), resp.error_message());
            return Ok(Err(MilvusFailure::Other(err)));
        }
        let code = resp.body.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code == 0 {
            return Ok(Ok(resp.body.get("data").cloned().unwrap_or(Value::Null)));
        }
        let message = resp.error_message();
        Ok(Err(classify(code, message)))
    }

    /// Like [`call`](Self::call) but every rejection is an error.
    fn call_ok(&self, endpoint: &str, body: Value) -> VectorDbResult<Value> {
        match self.call(endpoint, body)? {
            Ok(data) => Ok(data),
            Err(MilvusFailure::Other(e)) => Err(e),
            Err(MilvusFailure::NotFound) => Err(VectorDbError::backend(
                BACKEND,
                "100",
                format!("{} target not found", endpoint),
            )),
            Err(MilvusFailure::AlreadyExists) => Err(VectorDbError::backend(
                BACKEND,
                "65535",
                format!("{} target already exists", endpoint),
            )),
        }
    }

    fn ensure_collection(&self, name: &str, dimension: usize) -> VectorDbResult<()> {
        if self.has_collection(name)? {
            return Ok(());
        }
        let body = create_body(&self.namer.prefixed(name), dimension);
        match self.call("collections/create", body)? {
            Ok(_) => {
                tracing::info!(backend = BACKEND, collection = name, dimension, "created collection");
                Ok(())
            }
            Err(MilvusFailure::AlreadyExists) => Ok(()),
            Err(MilvusFailure::NotFound) => Err(VectorDbError::backend(
                BACKEND,
                "100",
                "database not found",
            )),
            Err(MilvusFailure::Other(e)) => Err(e),
        }
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
        let collection = self.namer.prefixed(name);
        let mut rows = Vec::with_capacity(vectors.len());
        // The flat response cannot be split per query vector, so search one at a time.
        for vector in vectors {
            let body = json!({
                "collectionName": collection,
                "data": [vector],
                "annsField": "vector",
                "limit": limit.min(MAX_LIMIT),
                "outputFields": OUTPUT_FIELDS,
            });
            let data = match self.call("entities/search", body)? {
                Ok(data) => data,
                Err(MilvusFailure::NotFound) => return Ok(None),
                Err(MilvusFailure::AlreadyExists) => {
                    return Err(VectorDbError::Serialization("unexpected search answer".into()))
                }
                Err(MilvusFailure::Other(e)) => return Err(e),
            };
            let hits = data.as_array().map(Vec::as_slice).unwrap_or(&[]);
            rows.push(hits.iter().map(scored_row).collect::<VectorDbResult<Vec<_>>>()?);
        }
        Ok(Some(normalize::search_result(rows)))
    }

    /// Page through `entities/query` with a primary-key cursor.
    ///
    /// Milvus caps a single query at [`MAX_LIMIT`] rows and returns them in
    /// primary-key order, so each page asks for ids above the last one seen
    /// until a short page comes back or `limit` is reached.
    fn query_inner(
        &self,
        name: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> VectorDbResult<Option<GetResult>> {
        if validate_collection_name(name).is_err() {
            return Ok(None);
        }
        let base = match filter.filter(|f| !f.is_empty()) {
            Some(f) => Some(translate_filter(f)?),
            None => None,
        };
        let collection = self.namer.prefixed(name);
        let mut points: Vec<StoredPoint> = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = MAX_LIMIT.min(limit.saturating_sub(points.len()));
            let body = json!({
                "collectionName": collection,
                "filter": page_filter(base.as_deref(), cursor.as_deref()),
                "limit": page,
                "outputFields": OUTPUT_FIELDS,
            });
            let data = match self.call("entities/query", body)? {
                Ok(data) => data,
                Err(MilvusFailure::NotFound) => return Ok(None),
                Err(MilvusFailure::AlreadyExists) => {
                    return Err(VectorDbError::Serialization("unexpected query answer".into()))
                }
                Err(MilvusFailure::Other(e)) => return Err(e),
            };
            let mut batch = data
                .as_array()
                .map(Vec::as_slice)
                .unwrap_or(&[])
                .iter()
                .map(stored_row)
                .collect::<VectorDbResult<Vec<_>>>()?;
            batch.sort_by(|a, b| a.id.to_string().cmp(&b.id.to_string()));
            let short = batch.len() < page;
            cursor = batch.last().map(|p| p.id.to_string());
            points.extend(batch);
            if short || cursor.is_none() || points.len() >= limit {
                break;
            }
            tracing::debug!(
                backend = BACKEND,
                collection = name,
                fetched = points.len(),
                "next query page"
            );
        }
        points.truncate(limit);
        Ok(Some(normalize::get_result(points)))
    }
}

/// Query expression for one page: the caller's filter (or every row) and,
/// after the first page, `id > <cursor>`.
pub fn page_filter(base: Option<&str>, after: Option<&str>) -> String {
    let cursor = after.map(|id| format!("id > {}", Value::String(id.to_string())));
    match (base, cursor) {
        (Some(base), Some(cursor)) => format!("({}) && {}", base, cursor),
        (Some(base), None) => base.to_string(),
        (None, Some(cursor)) => cursor,
        (None, None) => "id != \"\"".to_string(),
    }
}

fn classify(code: i64, message: String) -> MilvusFailure {
    let lower = message.to_lowercase();
    if code == 100
        || lower.contains("collection not found")
        || lower.contains("can't find collection")
    {
        MilvusFailure::NotFound
    } else if lower.contains("already exist") {
        MilvusFailure::AlreadyExists
    } else {
        MilvusFailure::Other(VectorDbError::backend(BACKEND, code.to_string(), message))
    }
}

fn scored_row(hit: &Value) -> VectorDbResult<ScoredPoint> {
    let p = stored_row(hit)?;
    Ok(ScoredPoint {
        id: p.id,
        score: hit.get("distance").and_then(Value::as_f64).unwrap_or_default() as f32,
        text: p.text,
        metadata: p.metadata,
    })
}

fn stored_row(row: &Value) -> VectorDbResult<StoredPoint> {
    StoredPoint::from_envelope(row.get("id").unwrap_or(&Value::Null), Some(row))
}

/// Request body for `collections/create`.
pub fn create_body(collection: &str, dimension: usize) -> Value {
    json!({
        "collectionName": collection,
        "schema": {
            "autoId": false,
            "enableDynamicField": false,
            "fields": [
                {"fieldName": "id", "dataType": "VarChar", "isPrimary": true,
                 "elementTypeParams": {"max_length": MAX_VARCHAR}},
                {"fieldName": "vector", "dataType": "FloatVector",
                 "elementTypeParams": {"dim": dimension}},
                {"fieldName": "text", "dataType": "VarChar",
                 "elementTypeParams": {"max_length": MAX_VARCHAR}},
                {"fieldName": "metadata", "dataType": "JSON"},
            ],
        },
        "indexParams": [
            {"fieldName": "vector", "indexName": "vector_index",
             "metricType": "COSINE", "indexType": "AUTOINDEX"},
        ],
    })
}

/// Translate an equality filter into a Milvus boolean expression.
///
/// Values are rendered as JSON literals, which Milvus parses for strings,
/// numbers and booleans. Null cannot be compared and is rejected.
pub fn translate_filter(filter: &MetadataFilter) -> VectorDbResult<String> {
    let mut clauses = Vec::with_capacity(filter.len());
    for (key, value) in filter.iter() {
        if matches!(value, JsonScalar::Null) {
            return Err(VectorDbError::invalid_input(format!(
                "milvus cannot filter '{}' on null",
                key
            )));
        }
        clauses.push(format!(
            "metadata[{}] == {}",
            Value::String(key.clone()),
            value.to_json()
        ));
    }
    Ok(clauses.join(" && "))
}

/// Expression selecting an id set.
pub fn ids_expr(ids: &[String]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| Value::String(id.clone()).to_string()).collect();
    format!("id in [{}]", quoted.join(", "))
}

impl VectorDb for MilvusVectorDb {
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
        let data = self.call_ok(
            "collections/has",
            json!({"collectionName": self.namer.prefixed(name)}),
        )?;
        Ok(data.get("has").and_then(Value::as_bool).unwrap_or(false))
    }

    fn delete_collection(&self, name: &str) -> VectorDbResult<()> {
        if validate_collection_name(name).is_err() {
            return Ok(());
        }
        let body = json!({"collectionName": self.namer.prefixed(name)});
        match self.call("collections/drop", body)? {
            Ok(_) => {
                tracing::info!(backend = BACKEND, collection = name, "dropped collection");
                Ok(())
            }
            Err(MilvusFailure::NotFound) => Ok(()),
            Err(MilvusFailure::AlreadyExists) => Ok(()),
            Err(MilvusFailure::Other(e)) => Err(e),
        }
    }

    fn upsert(&self, name: &str, items: &[VectorItem]) -> VectorDbResult<()> {
        validate_collection_name(name)?;
        let dimension = validate_batch(items)?;
        self.ensure_collection(name, dimension)?;
        let data: Vec<Value> = items
            .iter()
            .map(|i| json!({"id": i.id, "vector": i.vector, "text": i.text, "metadata": i.metadata}))
            .collect();
        self.call_ok(
            "entities/upsert",
            json!({"collectionName": self.namer.prefixed(name), "data": data}),
        )?;
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
        let result = self.query_inner(name, Some(filter), resolve_limit(limit));
        ReadOutcome::from_read(BACKEND, "query", name, result)
    }

    fn get(&self, name: &str) -> ReadOutcome<GetResult> {
        let result = self.query_inner(name, None, resolve_limit(None));
        ReadOutcome::from_read(BACKEND, "get", name, result)
    }

    fn delete(&self, name: &str, selector: &DeleteSelector) -> VectorDbResult<()> {
        selector.validate()?;
        let expr = match selector {
            DeleteSelector::Ids(ids) => ids_expr(ids),
            DeleteSelector::Filter(f) => translate_filter(f)?,
        };
        if validate_collection_name(name).is_err() {
            return Ok(());
        }
        let body = json!({"collectionName": self.namer.prefixed(name), "filter": expr});
        match self.call("entities/delete", body)? {
            Ok(_) | Err(MilvusFailure::NotFound) => Ok(()),
            Err(MilvusFailure::AlreadyExists) => Ok(()),
            Err(MilvusFailure::Other(e)) => Err(e),
        }
    }

    fn list_collections(&self) -> VectorDbResult<Vec<String>> {
        let data = self.call_ok("collections/list", json!({}))?;
        let mut names: Vec<String> = data
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|n| self.namer.logical_name(n))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }
}
