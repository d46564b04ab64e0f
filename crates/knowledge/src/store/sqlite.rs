//! SQLite-backed vector store with brute-force similarity scoring.

use super::VectorStore;
use crate::types::{IndexSpec, IndexedVector, VectorMatch, VectorQuery};
use profrag_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Local vector store in a single SQLite file.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) the store at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::VectorStore(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::VectorStore(format!("Failed to open SQLite index: {}", e)))?;

        tracing::debug!("Opened SQLite vector store at {:?}", db_path);
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests and dry runs.
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::VectorStore(format!("Failed to open SQLite index: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> AppResult<Self> {
        let conn = Self::init(conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: Connection) -> AppResult<Connection> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimension INTEGER NOT NULL,
                metric TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS vectors (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL,
                PRIMARY KEY (collection, id),
                FOREIGN KEY (collection) REFERENCES collections(name)
            );
            "#,
        )
        .map_err(|e| AppError::VectorStore(format!("Failed to create tables: {}", e)))?;
        Ok(conn)
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::VectorStore("SQLite connection lock poisoned".to_string()))
    }

    fn collection_info(conn: &Connection, collection: &str) -> AppResult<(usize, String)> {
        conn.query_row(
            "SELECT dimension, metric FROM collections WHERE name = ?1",
            params![collection],
            |row| Ok((row.get::<_, i64>(0)? as usize, row.get::<_, String>(1)?)),
        )
        .optional()?
        .ok_or_else(|| AppError::VectorStore(format!("Collection '{}' does not exist", collection)))
    }
}

#[async_trait::async_trait]
impl VectorStore for SqliteVectorStore {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    async fn exists(&self, collection: &str) -> AppResult<bool> {
        let conn = self.lock()?;
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM collections WHERE name = ?1",
                params![collection],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn create(&self, collection: &str, spec: &IndexSpec) -> AppResult<()> {
        if !["cosine", "dotproduct"].contains(&spec.metric.as_str()) {
            return Err(AppError::VectorStore(format!(
                "Unsupported metric for SQLite store: {}",
                spec.metric
            )));
        }

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO collections (name, dimension, metric) VALUES (?1, ?2, ?3)",
            params![collection, spec.dimension as i64, spec.metric],
        )
        .map_err(|e| {
            AppError::VectorStore(format!("Failed to create collection '{}': {}", collection, e))
        })?;

        tracing::info!(
            collection,
            dimension = spec.dimension,
            metric = %spec.metric,
            "Created SQLite collection"
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[IndexedVector]) -> AppResult<usize> {
        let mut conn = self.lock()?;
        let (dimension, _) = Self::collection_info(&conn, collection)?;

        for record in records {
            if record.values.len() != dimension {
                return Err(AppError::VectorStore(format!(
                    "Vector '{}' has dimension {}, collection '{}' expects {}",
                    record.id,
                    record.values.len(),
                    collection,
                    dimension
                )));
            }
        }

        let tx = conn.transaction()?;
        for record in records {
            let metadata = serde_json::to_string(&record.metadata)?;
            tx.execute(
                "INSERT OR REPLACE INTO vectors (collection, id, embedding, metadata)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    collection,
                    record.id,
                    embedding_to_bytes(&record.values),
                    metadata
                ],
            )?;
        }
        tx.commit()?;

        Ok(records.len())
    }

    async fn query(&self, collection: &str, query: &VectorQuery) -> AppResult<Vec<VectorMatch>> {
        let conn = self.lock()?;
        let (dimension, metric) = Self::collection_info(&conn, collection)?;
        if query.vector.len() != dimension {
            return Err(AppError::VectorStore(format!(
                "Query vector has dimension {}, collection '{}' expects {}",
                query.vector.len(),
                collection,
                dimension
            )));
        }

        let mut stmt =
            conn.prepare("SELECT id, embedding, metadata FROM vectors WHERE collection = ?1")?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, bytes, metadata) = row?;
            let Some(embedding) = bytes_to_embedding(&bytes) else {
                tracing::warn!(id = %id, "Skipping vector with corrupt embedding");
                continue;
            };

            let score = match metric.as_str() {
                "dotproduct" => dot_product(&query.vector, &embedding),
                _ => cosine_similarity(&query.vector, &embedding),
            };

            let metadata = if query.include_metadata {
                serde_json::from_str(&metadata).ok()
            } else {
                None
            };

            results.push(VectorMatch {
                id,
                score,
                metadata,
            });
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(query.top_k);

        tracing::debug!(
            "Retrieved {} vectors (requested top-{})",
            results.len(),
            query.top_k
        );

        Ok(results)
    }

    async fn count(&self, collection: &str) -> AppResult<usize> {
        let conn = self.lock()?;
        Self::collection_info(&conn, collection)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vectors WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Convert embedding vector to little-endian bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Convert bytes back to an embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }

    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Calculate cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product(a, b) / (norm_a * norm_b)
}
