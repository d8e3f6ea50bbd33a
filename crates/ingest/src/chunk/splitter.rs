//! Recursive character splitter.
//!
//! Text is split on the coarsest separator first ("\n\n", then "\n", then
//! " ", then between characters). Pieces that still exceed the chunk size are
//! split again with the finer separators, and the resulting sub-units are
//! merged back into chunks of at most `chunk_size` characters.

use super::{merging::merge_units, Chunk, Span};
use docingest_core::{config::ChunkingSettings, AppError, AppResult};

/// Separators from coarsest to finest. The empty separator splits between
/// characters and always terminates the recursion.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Configuration for the splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,

    /// Separators from coarsest to finest
    pub separators: Vec<String>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

impl ChunkConfig {
    /// Create a config with the default separators.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the separator list.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Build from the application chunking settings.
    pub fn from_settings(settings: &ChunkingSettings) -> Self {
        let config = Self::new(settings.chunk_size, settings.chunk_overlap);
        match &settings.separators {
            Some(separators) => config.with_separators(separators.iter().cloned()),
            None => config,
        }
    }

    /// Check `0 <= chunk_overlap < chunk_size`.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk size must be at least 1".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits text into overlapping chunks, preferring natural boundaries.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    config: ChunkConfig,
}

impl RecursiveCharacterSplitter {
    /// Create a splitter, rejecting invalid size/overlap combinations.
    pub fn new(config: ChunkConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Split text into chunks, in source order.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let units = split_units(text, 0, &self.config.separators, self.config.chunk_size);
        let spans = merge_units(&units, self.config.chunk_size, self.config.chunk_overlap);

        let chunks: Vec<Chunk> = spans
            .into_iter()
            .map(|span| Chunk::from_source(text, span.start, span.end, span.chars))
            .collect();

        tracing::trace!(
            "Split {} bytes into {} chunks ({} sub-units)",
            text.len(),
            chunks.len(),
            units.len()
        );

        chunks
    }

    /// Split text and return only the chunk texts.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split(text).into_iter().map(|c| c.text).collect()
    }
}

/// Break `text` (located at byte `offset` of the source) into sub-units that
/// fit `chunk_size`, recursing into finer separators for oversized pieces.
/// A piece left oversized after the last separator is returned as is.
fn split_units(text: &str, offset: usize, separators: &[String], chunk_size: usize) -> Vec<Span> {
    let whole = Span::of(text, offset);
    if whole.chars <= chunk_size {
        return vec![whole];
    }

    let Some((separator, finer)) = separators.split_first() else {
        return vec![whole];
    };

    let mut units = Vec::new();
    for (piece_offset, piece) in split_keeping_separator(text, separator) {
        let span = Span::of(piece, offset + piece_offset);
        if span.chars <= chunk_size {
            units.push(span);
        } else {
            units.extend(split_units(piece, span.start, finer, chunk_size));
        }
    }
    units
}

/// Split on `separator`, keeping it at the end of each piece so the pieces
/// tile the input exactly. Returns each piece with its byte offset.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<(usize, &'a str)> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| (i, &text[i..i + c.len_utf8()]))
            .collect();
    }

    let mut pieces = Vec::new();
    let mut offset = 0;
    for piece in text.split_inclusive(separator) {
        pieces.push((offset, piece));
        offset += piece.len();
    }
    pieces
}
