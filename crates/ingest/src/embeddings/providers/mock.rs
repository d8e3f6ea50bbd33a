//! Offline embedding provider for tests and dry runs.

use crate::embeddings::provider::EmbeddingProvider;
use docingest_core::AppResult;

/// Deterministic provider that needs no network.
///
/// Hashes lowercase character trigrams into a fixed number of buckets and
/// normalises the result to unit length, so texts sharing words land near
/// each other. Empty text maps to the zero vector.
#[derive(Debug, Clone)]
pub struct MockProvider {
    dimensions: usize,
}

impl MockProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return embedding;
        }

        let chars: Vec<char> = text.to_lowercase().chars().collect();
        for window in chars.windows(3) {
            let bucket = window
                .iter()
                .fold(0xcbf2_9ce4_8422_2325u64, |acc, c| {
                    (acc ^ u64::from(*c)).wrapping_mul(0x0100_0000_01b3)
                });
            embedding[(bucket % self.dimensions as u64) as usize] += 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
