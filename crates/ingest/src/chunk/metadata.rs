//! Per-record metadata attached to every chunk.

use crate::record::Record;
use serde::{Deserialize, Serialize};

/// Metadata shared by all chunks of one record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Record title, empty when the record has none
    pub title: String,

    /// Article URL derived from the record id, empty when the record has none
    pub url: String,
}

impl ChunkMetadata {
    /// Derive metadata for a record.
    pub fn for_record(record: &Record, url: &ArticleUrl) -> Self {
        Self {
            title: record.title.clone().unwrap_or_default(),
            url: record
                .id
                .as_deref()
                .map(|id| url.render(id))
                .unwrap_or_default(),
        }
    }
}

/// Template for article URLs: `https://<host>/articles.cfm?ID=<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleUrl {
    host: String,
}

impl ArticleUrl {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Render the URL for an id. The id is inserted verbatim.
    pub fn render(&self, id: &str) -> String {
        format!("https://{}/articles.cfm?ID={}", self.host, id)
    }
}
