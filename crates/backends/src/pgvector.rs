//! Postgres + pgvector adapter.
//!
//! One table per collection:
//!
//! ```sql
//! CREATE TABLE "<prefix>_<name>" (
//!     id        TEXT PRIMARY KEY,
//!     embedding vector(<dim>) NOT NULL,
//!     text      TEXT NOT NULL,
//!     metadata  JSONB NOT NULL
//! )
//! ```
//!
//! Search orders by cosine distance (`<=>`). Filters use JSONB containment
//! (`metadata @> {"key": value}`), which is exact equality for scalars.
//!
//! The adapter owns a private tokio runtime that drives the sqlx pool, so
//! its blocking methods must not be called from inside another async
//! runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use veclayer_core::normalize::{self, ScoredPoint, StoredPoint};
use veclayer_core::{
    resolve_limit, validate_batch, validate_collection_name, CollectionNamer, DeleteSelector,
    GetResult, MetadataFilter, PointId, ReadOutcome, SearchResult, VectorDb, VectorDbError,
    VectorDbResult, VectorItem,
};

const BACKEND: &str = "pgvector";

/// Postgres truncates identifiers longer than this.
pub const MAX_IDENTIFIER_LEN: usize = 63;

const UNDEFINED_TABLE: &str = "42P01";
const DUPLICATE_TABLE: &str = "42P07";
const UNIQUE_VIOLATION: &str = "23505";

/// pgvector connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PgvectorConfig {
    /// `postgres://` connection string
    pub url: String,
    /// Pool size
    pub max_connections: u32,
    /// Connection acquire timeout
    pub timeout_secs: u64,
}

impl Default for PgvectorConfig {
    fn default() -> Self {
        PgvectorConfig {
            url: String::new(),
            max_connections: 5,
            timeout_secs: 30,
        }
    }
}

/// `VectorDb` over Postgres with the pgvector extension.
pub struct PgvectorVectorDb {
    runtime: tokio::runtime::Runtime,
    pool: PgPool,
    namer: CollectionNamer,
}

impl std::fmt::Debug for PgvectorVectorDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgvectorVectorDb")
            .field("prefix", &self.namer.prefix())
            .finish()
    }
}

impl PgvectorVectorDb {
    /// Connect and make sure the `vector` extension is installed.
    ///
    /// # Errors
    /// - `Config` if the URL is empty or the runtime cannot start
    /// - `Unavailable` if the database cannot be reached
    pub fn connect(config: &PgvectorConfig, prefix: &str) -> VectorDbResult<Self> {
        if config.url.is_empty() {
            return Err(VectorDbError::Config("pgvector url is not set".into()));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("veclayer-pgvector")
            .enable_all()
            .build()
            .map_err(|e| VectorDbError::Config(format!("cannot start runtime: {}", e)))?;

        let pool = runtime
            .block_on(
                PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(Duration::from_secs(config.timeout_secs))
                    .connect(&config.url),
            )
            .map_err(map_sqlx)?;

        runtime
            .block_on(sqlx::query("CREATE EXTENSION IF NOT EXISTS vector").execute(&pool))
            .map_err(map_sqlx)?;

        tracing::info!(backend = BACKEND, max_connections = config.max_connections, "connected");
        Ok(PgvectorVectorDb {
            runtime,
            pool,
            namer: CollectionNamer::new(prefix),
        })
    }

    /// Table name for a logical collection, validated.
    fn table(&self, name: &str) -> VectorDbResult<String> {
        validate_collection_name(name)?;
        table_name(&self.namer, name)
    }

    async fn table_exists(&self, table: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await
    }

    /// Create the table if absent and return its vector dimension.
    async fn ensure_table(&self, table: &str, dimension: usize) -> VectorDbResult<usize> {
        if !self.table_exists(table).await.map_err(map_sqlx)? {
            match sqlx::query(&create_table_sql(table, dimension))
                .execute(&self.pool)
                .await
            {
                Ok(_) => {
                    tracing::info!(backend = BACKEND, collection = table, dimension, "created table");
                }
                // A concurrent writer created it first.
                Err(e) if matches!(sqlstate(&e).as_deref(), Some(DUPLICATE_TABLE | UNIQUE_VIOLATION)) => {}
                Err(e) => return Err(map_sqlx(e)),
            }
        }
        // For vector columns atttypmod holds the dimension.
        let typmod = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT atttypmod FROM pg_attribute
            WHERE attrelid = to_regclass($1) AND attname = 'embedding'
            "#,
        )
        .bind(quote_ident(table))
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(usize::try_from(typmod).unwrap_or(dimension))
    }

    async fn write_batch(&self, table: &str, items: &[VectorItem]) -> Result<(), sqlx::Error> {
        let sql = upsert_sql(table);
        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(&sql)
                .bind(&item.id)
                .bind(vector_literal(&item.vector))
                .bind(&item.text)
                .bind(sqlx::types::Json(&item.metadata))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    }

    async fn search_rows(
        &self,
        table: &str,
        vectors: &[Vec<f32>],
        limit: i64,
    ) -> Result<Vec<Vec<ScoredPoint>>, sqlx::Error> {
        let sql = format!(
            "SELECT id, text, metadata, (embedding <=> $1::vector) AS distance \
             FROM {} ORDER BY distance ASC, id ASC LIMIT $2",
            quote_ident(table)
        );
        let mut rows = Vec::with_capacity(vectors.len());
        for vector in vectors {
            let fetched = sqlx::query(&sql)
                .bind(vector_literal(vector))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
            rows.push(
                fetched
                    .iter()
                    .map(|row| {
                        let p = stored_point(row)?;
                        let distance: f64 = row.try_get("distance")?;
                        Ok(ScoredPoint {
                            id: p.id,
                            score: distance as f32,
                            text: p.text,
                            metadata: p.metadata,
                        })
                    })
                    .collect::<Result<Vec<_>, sqlx::Error>>()?,
            );
        }
        Ok(rows)
    }

    async fn select_rows(
        &self,
        table: &str,
        filter: Option<&MetadataFilter>,
        limit: i64,
    ) -> Result<Vec<StoredPoint>, sqlx::Error> {
        let rows = match filter.filter(|f| !f.is_empty()) {
            Some(f) => {
                let sql = format!(
                    "SELECT id, text, metadata FROM {} WHERE metadata @> $1::jsonb ORDER BY id LIMIT $2",
                    quote_ident(table)
                );
                sqlx::query(&sql)
                    .bind(sqlx::types::Json(containment(f)))
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT id, text, metadata FROM {} ORDER BY id LIMIT $1",
                    quote_ident(table)
                );
                sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?
            }
        };
        rows.iter().map(stored_point).collect()
    }

    fn read<T>(
        &self,
        name: &str,
        f: impl std::future::Future<Output = Result<T, sqlx::Error>>,
    ) -> VectorDbResult<Option<T>> {
        match self.runtime.block_on(f) {
            Ok(v) => Ok(Some(v)),
            Err(e) if sqlstate(&e).as_deref() == Some(UNDEFINED_TABLE) => {
                tracing::debug!(backend = BACKEND, collection = name, "table missing");
                Ok(None)
            }
            Err(e) => Err(map_sqlx(e)),
        }
    }
}

fn stored_point(row: &PgRow) -> Result<StoredPoint, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let text: Option<String> = row.try_get("text")?;
    let metadata: Option<Value> = row.try_get("metadata")?;
    let metadata = normalize::metadata_value(metadata.as_ref())
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(StoredPoint {
        id: PointId::Str(id),
        text: text.unwrap_or_default(),
        metadata,
    })
}

/// SQLSTATE of a database error.
fn sqlstate(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Map a sqlx error into the adapter taxonomy.
pub fn map_sqlx(e: sqlx::Error) -> VectorDbError {
    match e {
        sqlx::Error::Database(db) => VectorDbError::backend(
            BACKEND,
            db.code().map(|c| c.into_owned()).unwrap_or_default(),
            db.message().to_string(),
        ),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => VectorDbError::unavailable(BACKEND, e.to_string()),
        sqlx::Error::Configuration(_) => VectorDbError::Config(e.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            VectorDbError::Serialization(e.to_string())
        }
        other => VectorDbError::backend(BACKEND, "sqlx", other.to_string()),
    }
}

/// Prefixed table name, rejecting names Postgres would truncate.
pub fn table_name(namer: &CollectionNamer, name: &str) -> VectorDbResult<String> {
    let table = namer.prefixed(name);
    if table.len() > MAX_IDENTIFIER_LEN {
        return Err(VectorDbError::invalid_input(format!(
            "table name '{}' exceeds {} bytes",
            table, MAX_IDENTIFIER_LEN
        )));
    }
    Ok(table)
}

/// Double-quote an identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// pgvector text literal, e.g. `[0.5,1]`.
pub fn vector_literal(v: &[f32]) -> String {
    let parts: Vec<String> = v.iter().map(f32::to_string).collect();
    format!("[{}]", parts.join(","))
}

/// JSONB document whose containment is the conjunctive filter.
pub fn containment(filter: &MetadataFilter) -> Value {
    Value::Object(
        filter
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

fn create_table_sql(table: &str, dimension: usize) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         id TEXT PRIMARY KEY, \
         embedding vector({}) NOT NULL, \
         text TEXT NOT NULL DEFAULT '', \
         metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb)",
        quote_ident(table),
        dimension
    )
}

fn upsert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (id, embedding, text, metadata) VALUES ($1, $2::vector, $3, $4) \
         ON CONFLICT (id) DO UPDATE SET \
         embedding = EXCLUDED.embedding, text = EXCLUDED.text, metadata = EXCLUDED.metadata",
        quote_ident(table)
    )
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl VectorDb for PgvectorVectorDb {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn namer(&self) -> &CollectionNamer {
        &self.namer
    }

    fn has_collection(&self, name: &str) -> VectorDbResult<bool> {
        let Ok(table) = self.table(name) else {
            return Ok(false);
        };
        self.runtime
            .block_on(self.table_exists(&table))
            .map_err(map_sqlx)
    }

    fn delete_collection(&self, name: &str) -> VectorDbResult<()> {
        let Ok(table) = self.table(name) else {
            return Ok(());
        };
        let sql = format!("DROP TABLE IF EXISTS {}", quote_ident(&table));
        self.runtime
            .block_on(sqlx::query(&sql).execute(&self.pool))
            .map_err(map_sqlx)?;
        tracing::info!(backend = BACKEND, collection = name, "dropped table");
        Ok(())
    }

    fn upsert(&self, name: &str, items: &[VectorItem]) -> VectorDbResult<()> {
        let table = self.table(name)?;
        let dimension = validate_batch(items)?;
        self.runtime.block_on(async {
            let expected = self.ensure_table(&table, dimension).await?;
            if let Some(bad) = items.iter().find(|i| i.dimension() != expected) {
                return Err(VectorDbError::DimensionMismatch {
                    expected,
                    actual: bad.dimension(),
                });
            }
            self.write_batch(&table, items).await.map_err(map_sqlx)
        })?;
        tracing::debug!(backend = BACKEND, collection = name, count = items.len(), "upserted");
        Ok(())
    }

    fn search(
        &self,
        name: &str,
        vectors: &[Vec<f32>],
        limit: Option<usize>,
    ) -> ReadOutcome<SearchResult> {
        let result = match self.table(name) {
            Ok(table) => self
                .read(name, self.search_rows(&table, vectors, sql_limit(resolve_limit(limit))))
                .map(|rows| rows.map(normalize::search_result)),
            Err(_) => Ok(None),
        };
        ReadOutcome::from_read(BACKEND, "search", name, result)
    }

    fn query(
        &self,
        name: &str,
        filter: &MetadataFilter,
        limit: Option<usize>,
    ) -> ReadOutcome<GetResult> {
        let result = match self.table(name) {
            Ok(table) => self
                .read(name, self.select_rows(&table, Some(filter), sql_limit(resolve_limit(limit))))
                .map(|rows| rows.map(normalize::get_result)),
            Err(_) => Ok(None),
        };
        ReadOutcome::from_read(BACKEND, "query", name, result)
    }

    fn get(&self, name: &str) -> ReadOutcome<GetResult> {
        let result = match self.table(name) {
            Ok(table) => self
                .read(name, self.select_rows(&table, None, sql_limit(resolve_limit(None))))
                .map(|rows| rows.map(normalize::get_result)),
            Err(_) => Ok(None),
        };
        ReadOutcome::from_read(BACKEND, "get", name, result)
    }

    fn delete(&self, name: &str, selector: &DeleteSelector) -> VectorDbResult<()> {
        selector.validate()?;
        let Ok(table) = self.table(name) else {
            return Ok(());
        };
        let outcome = self.runtime.block_on(async {
            match selector {
                DeleteSelector::Ids(ids) => {
                    let sql = format!("DELETE FROM {} WHERE id = ANY($1)", quote_ident(&table));
                    sqlx::query(&sql).bind(ids.as_slice()).execute(&self.pool).await
                }
                DeleteSelector::Filter(f) => {
                    let sql = format!(
                        "DELETE FROM {} WHERE metadata @> $1::jsonb",
                        quote_ident(&table)
                    );
                    sqlx::query(&sql)
                        .bind(sqlx::types::Json(containment(f)))
                        .execute(&self.pool)
                        .await
                }
            }
        });
        match outcome {
            Ok(done) => {
                tracing::debug!(
                    backend = BACKEND,
                    collection = name,
                    count = done.rows_affected(),
                    "deleted rows"
                );
                Ok(())
            }
            Err(e) if sqlstate(&e).as_deref() == Some(UNDEFINED_TABLE) => Ok(()),
            Err(e) => Err(map_sqlx(e)),
        }
    }

    fn list_collections(&self) -> VectorDbResult<Vec<String>> {
        let tables: Vec<String> = self
            .runtime
            .block_on(
                sqlx::query_scalar::<_, String>(
                    "SELECT table_name::text FROM information_schema.tables \
                     WHERE table_schema = current_schema()",
                )
                .fetch_all(&self.pool),
            )
            .map_err(map_sqlx)?;
        let mut names: Vec<String> = tables
            .iter()
            .filter_map(|t| self.namer.logical_name(t))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    fn close(&self) -> VectorDbResult<()> {
        self.runtime.block_on(self.pool.close());
        tracing::info!(backend = BACKEND, "pool closed");
        Ok(())
    }
}
