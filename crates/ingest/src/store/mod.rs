//! Vector store abstraction.
//!
//! A store receives the parallel sequences produced by the chunking pipeline
//! together with their embeddings and upserts them in one call.

pub mod pinecone;
pub mod sqlite;

pub use pinecone::PineconeStore;
pub use sqlite::SqliteStore;

use crate::chunk::ChunkMetadata;
use docingest_core::{
    config::{StoreKind, VectorStoreSettings},
    AppError, AppResult,
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Where and how vectors are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOptions {
    pub index_name: String,
    pub namespace: String,
    /// Metadata key the chunk text is stored under
    pub text_key: String,
}

impl UpsertOptions {
    pub fn from_settings(settings: &VectorStoreSettings) -> Self {
        Self {
            index_name: settings.index_name.clone(),
            namespace: settings.namespace.clone(),
            text_key: settings.text_key.clone(),
        }
    }
}

/// One bulk upsert: texts, metadata and embeddings share positions.
#[derive(Debug, Clone, Copy)]
pub struct UpsertRequest<'a> {
    pub texts: &'a [String],
    pub metadatas: &'a [ChunkMetadata],
    pub embeddings: &'a [Vec<f32>],
    pub options: &'a UpsertOptions,
}

/// A vector ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

impl UpsertRequest<'_> {
    /// Pair texts, metadata and embeddings into records with fresh ids.
    ///
    /// The stored metadata is the chunk metadata plus the text under
    /// `options.text_key`.
    pub fn to_vectors(&self) -> AppResult<Vec<VectorRecord>> {
        if self.texts.len() != self.metadatas.len() || self.texts.len() != self.embeddings.len() {
            return Err(AppError::Ingestion(format!(
                "Mismatched upsert lengths: {} texts, {} metadatas, {} embeddings",
                self.texts.len(),
                self.metadatas.len(),
                self.embeddings.len()
            )));
        }

        self.texts
            .iter()
            .zip(self.metadatas)
            .zip(self.embeddings)
            .map(|((text, metadata), embedding)| {
                let mut fields = match serde_json::to_value(metadata)? {
                    Value::Object(fields) => fields,
                    other => {
                        return Err(AppError::Serialization(format!(
                            "Chunk metadata must serialize to an object, got {}",
                            other
                        )))
                    }
                };
                fields.insert(self.options.text_key.clone(), Value::String(text.clone()));

                Ok(VectorRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    values: embedding.clone(),
                    metadata: fields,
                })
            })
            .collect()
    }
}

/// Trait for vector store backends.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Insert or update every vector of the request. Returns the number written.
    async fn upsert(&self, request: UpsertRequest<'_>) -> AppResult<usize>;
}

/// Build the store selected in the settings.
pub async fn create_store(settings: &VectorStoreSettings) -> AppResult<Box<dyn VectorStore>> {
    match settings.kind {
        StoreKind::Pinecone => Ok(Box::new(PineconeStore::connect(settings).await?)),
        StoreKind::Sqlite => {
            let path = settings.path.as_deref().ok_or_else(|| {
                AppError::Config("The sqlite vector store needs a database path".to_string())
            })?;
            Ok(Box::new(SqliteStore::open(path)?))
        }
    }
}
