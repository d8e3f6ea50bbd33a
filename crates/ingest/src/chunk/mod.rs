//! Chunking pipeline for ingested records.
//!
//! This module provides:
//! - A recursive character splitter with size and overlap bounds
//! - Per-record metadata attached to every chunk
//! - The record-to-chunk pipeline producing parallel text/metadata sequences

mod merging;
mod metadata;
mod pipeline;
mod splitter;

pub use metadata::{ArticleUrl, ChunkMetadata};
pub use pipeline::{ChunkBatch, ChunkPipeline, PipelineStats};
pub use splitter::{ChunkConfig, RecursiveCharacterSplitter, DEFAULT_SEPARATORS};

use serde::{Deserialize, Serialize};

/// A contiguous piece of a record body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text content
    pub text: String,

    /// Byte range in the original text (`&text[start..end]`)
    pub byte_range: (usize, usize),

    /// Character count
    pub char_count: usize,
}

impl Chunk {
    /// Cut a chunk out of `source` at the given byte range.
    pub(crate) fn from_source(source: &str, start: usize, end: usize, char_count: usize) -> Self {
        Self {
            text: source[start..end].to_string(),
            byte_range: (start, end),
            char_count,
        }
    }
}

/// A unit of text located in the source: byte offsets plus its char length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
    pub chars: usize,
}

impl Span {
    /// Span covering `piece`, which starts at byte `start` of the source.
    pub fn of(piece: &str, start: usize) -> Self {
        Self {
            start,
            end: start + piece.len(),
            chars: piece.chars().count(),
        }
    }
}
