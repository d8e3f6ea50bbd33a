//! SQLite-backed vector store for local runs and tests.

use super::{UpsertRequest, VectorStore};
use docingest_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;

/// A vector read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredVector {
    pub id: String,
    pub namespace: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Value,
}

/// Vector store writing to a single SQLite table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::ExternalService(format!("Failed to open SQLite store: {}", e)))?;
        init_schema(&conn)?;

        tracing::debug!("Opened SQLite vector store at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Store kept in memory, dropped with the value.
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::ExternalService(format!("Failed to open SQLite store: {}", e)))?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of vectors in a namespace.
    pub fn count(&self, namespace: &str) -> AppResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM vectors WHERE namespace = ?1",
                params![namespace],
                |row| row.get(0),
            )
            .map_err(|e| AppError::ExternalService(format!("Failed to count vectors: {}", e)))?;

        Ok(count as usize)
    }

    /// Every vector in a namespace, in insertion order.
    pub fn vectors(&self, namespace: &str) -> AppResult<Vec<StoredVector>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, namespace, text, embedding, metadata FROM vectors
                 WHERE namespace = ?1 ORDER BY rowid",
            )
            .map_err(|e| AppError::ExternalService(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![namespace], |row| {
                let embedding: Vec<u8> = row.get(3)?;
                let metadata: String = row.get(4)?;
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    embedding,
                    metadata,
                ))
            })
            .map_err(|e| AppError::ExternalService(format!("Failed to query vectors: {}", e)))?;

        let mut vectors = Vec::new();
        for row in rows {
            let (id, namespace, text, embedding, metadata) = row
                .map_err(|e| AppError::ExternalService(format!("Failed to read vector: {}", e)))?;
            vectors.push(StoredVector {
                id,
                namespace,
                text,
                embedding: bytes_to_embedding(&embedding)?,
                metadata: serde_json::from_str(&metadata)?,
            });
        }

        Ok(vectors)
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::ExternalService("SQLite store lock poisoned".to_string()))
    }
}

fn init_schema(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            id TEXT PRIMARY KEY,
            index_name TEXT NOT NULL,
            namespace TEXT NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_vectors_namespace ON vectors(namespace);
        "#,
    )
    .map_err(|e| AppError::ExternalService(format!("Failed to create tables: {}", e)))
}

#[async_trait::async_trait]
impl VectorStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn upsert(&self, request: UpsertRequest<'_>) -> AppResult<usize> {
        let vectors = request.to_vectors()?;
        let options = request.options;

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::ExternalService(format!("Failed to begin transaction: {}", e)))?;

        for (vector, text) in vectors.iter().zip(request.texts) {
            let metadata = serde_json::to_string(&vector.metadata)?;
            tx.execute(
                "INSERT OR REPLACE INTO vectors (id, index_name, namespace, text, embedding, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    vector.id,
                    options.index_name,
                    options.namespace,
                    text,
                    embedding_to_bytes(&vector.values),
                    metadata,
                ],
            )
            .map_err(|e| AppError::ExternalService(format!("Failed to insert vector: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::ExternalService(format!("Failed to commit vectors: {}", e)))?;

        tracing::debug!(
            "Upserted {} vectors into namespace {:?}",
            vectors.len(),
            options.namespace
        );
        Ok(vectors.len())
    }
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|value| value.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Serialization(format!(
            "Embedding blob has {} bytes, not a multiple of 4",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
