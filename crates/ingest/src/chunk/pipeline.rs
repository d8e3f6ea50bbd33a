//! Record-to-chunk pipeline.

use super::{ArticleUrl, ChunkMetadata, RecursiveCharacterSplitter};
use crate::record::Record;
use docingest_core::{config::MalformedPolicy, AppError, AppResult};

/// Parallel sequences of chunk texts and their metadata.
///
/// Position `i` of both sequences refers to the same chunk; the two always
/// have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkBatch {
    texts: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
}

impl ChunkBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: String, metadata: ChunkMetadata) {
        self.texts.push(text);
        self.metadatas.push(metadata);
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn metadatas(&self) -> &[ChunkMetadata] {
        &self.metadatas
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Counters collected while building a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Records chunked
    pub records: usize,
    /// Malformed lines skipped (only with `MalformedPolicy::Skip`)
    pub skipped: usize,
    /// Chunks produced
    pub chunks: usize,
}

/// Turns records into a `ChunkBatch`.
#[derive(Debug, Clone)]
pub struct ChunkPipeline {
    splitter: RecursiveCharacterSplitter,
    url: ArticleUrl,
    policy: MalformedPolicy,
}

impl ChunkPipeline {
    pub fn new(splitter: RecursiveCharacterSplitter, url: ArticleUrl, policy: MalformedPolicy) -> Self {
        Self {
            splitter,
            url,
            policy,
        }
    }

    /// Chunk every record in order.
    ///
    /// Records keep input order and chunks keep splitter order. A malformed
    /// record aborts the batch unless the policy is `Skip`; other errors
    /// always abort.
    pub fn build_batch<I>(&self, records: I) -> AppResult<(ChunkBatch, PipelineStats)>
    where
        I: IntoIterator<Item = AppResult<Record>>,
    {
        let mut batch = ChunkBatch::new();
        let mut stats = PipelineStats::default();

        for item in records {
            let record = match item {
                Ok(record) => record,
                Err(AppError::MalformedInput { line, reason })
                    if self.policy == MalformedPolicy::Skip =>
                {
                    tracing::warn!("Skipping malformed line {}: {}", line, reason);
                    stats.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let metadata = ChunkMetadata::for_record(&record, &self.url);
            let chunks = self.splitter.split(&record.body);

            tracing::debug!(
                "Line {}: {} chunks from {} bytes",
                record.line,
                chunks.len(),
                record.body.len()
            );

            stats.records += 1;
            stats.chunks += chunks.len();
            for chunk in chunks {
                batch.push(chunk.text, metadata.clone());
            }
        }

        tracing::info!(
            "Chunking complete: {} chunks from {} records ({} skipped)",
            stats.chunks,
            stats.records,
            stats.skipped
        );

        Ok((batch, stats))
    }
}
