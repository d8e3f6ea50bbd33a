//! Document ingestion: ndjson records to chunked, embedded vectors.
//!
//! Reads an ndjson export, splits every body with a recursive character
//! splitter, attaches per-article metadata, embeds the chunks and upserts
//! them into a vector store in one pass.

pub mod chunk;
pub mod embeddings;
pub mod record;
pub mod store;

#[cfg(test)]
mod tests;

pub use chunk::{ChunkBatch, ChunkMetadata, ChunkPipeline, PipelineStats};
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use record::{Record, RecordReader};
pub use store::{create_store, UpsertOptions, UpsertRequest, VectorStore};

use chunk::{ArticleUrl, ChunkConfig, RecursiveCharacterSplitter};
use docingest_core::{AppConfig, AppError, AppResult};
use std::time::Instant;
use tracing::{info, info_span, Instrument};

/// Outcome of a successful ingestion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Records chunked
    pub records: usize,

    /// Malformed lines skipped
    pub skipped: usize,

    /// Chunks produced
    pub chunks: usize,

    /// Vectors written to the store
    pub upserted: usize,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Build the embedding provider and vector store from the configuration,
/// then ingest.
pub async fn run(config: &AppConfig) -> AppResult<IngestReport> {
    let embedding_config =
        EmbeddingConfig::from_settings(&config.embedding).map_err(AppError::into_ingestion_failure)?;
    let embedder = create_provider(&embedding_config).map_err(AppError::into_ingestion_failure)?;
    let store = create_store(&config.vector_store)
        .await
        .map_err(AppError::into_ingestion_failure)?;

    ingest(config, embedder.as_ref(), store.as_ref()).await
}

/// Ingest the configured input file into `store`.
///
/// Any failure is reported as [`AppError::IngestionFailed`] wrapping the
/// underlying error. An input with no chunks skips the upsert and succeeds.
pub async fn ingest(
    config: &AppConfig,
    embedder: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
) -> AppResult<IngestReport> {
    let span = info_span!(
        "ingest",
        input = %config.input.display(),
        provider = embedder.provider_name(),
        store = store.name()
    );

    ingest_inner(config, embedder, store)
        .instrument(span)
        .await
        .map_err(|e| {
            tracing::error!("Ingestion failed: {}", e);
            e.into_ingestion_failure()
        })
}

async fn ingest_inner(
    config: &AppConfig,
    embedder: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
) -> AppResult<IngestReport> {
    let start = Instant::now();

    let splitter = RecursiveCharacterSplitter::new(ChunkConfig::from_settings(&config.chunking))?;
    let pipeline = ChunkPipeline::new(
        splitter,
        ArticleUrl::new(config.article_host.clone()),
        config.on_malformed,
    );

    info!("Reading records from {:?}", config.input);
    let reader = RecordReader::open(&config.input)?;
    let (batch, stats) = pipeline.build_batch(reader)?;

    let mut report = IngestReport {
        records: stats.records,
        skipped: stats.skipped,
        chunks: stats.chunks,
        ..Default::default()
    };

    if batch.is_empty() {
        info!("No chunks produced, skipping upsert");
        report.duration_secs = start.elapsed().as_secs_f64();
        return Ok(report);
    }

    info!(
        "Embedding {} chunks with {} ({})",
        batch.len(),
        embedder.provider_name(),
        embedder.model_name()
    );
    let embeddings = embedder.embed_batch(batch.texts()).await?;
    if embeddings.len() != batch.len() {
        return Err(AppError::Ingestion(format!(
            "Embedding provider returned {} vectors for {} chunks",
            embeddings.len(),
            batch.len()
        )));
    }

    let options = UpsertOptions::from_settings(&config.vector_store);
    report.upserted = store
        .upsert(UpsertRequest {
            texts: batch.texts(),
            metadatas: batch.metadatas(),
            embeddings: &embeddings,
            options: &options,
        })
        .await?;

    report.duration_secs = start.elapsed().as_secs_f64();
    info!(
        "Ingested {} records as {} vectors in {:.2}s",
        report.records, report.upserted, report.duration_secs
    );

    Ok(report)
}
