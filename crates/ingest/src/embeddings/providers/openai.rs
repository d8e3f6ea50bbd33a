//! OpenAI embedding provider.
//!
//! Calls `POST {endpoint}/embeddings` with batches of up to `batch_size`
//! texts. Failures are not retried; any error aborts the run.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use async_trait::async_trait;
use docingest_core::{
    config::{resolve_secret, DEFAULT_OPENAI_KEY_ENV},
    AppError, AppResult,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// OpenAI embeddings API client.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
    strip_new_lines: bool,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAiProvider {
    /// Create a provider, reading the API key from the configured variable.
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let key_env = config.api_key_env.as_deref().unwrap_or(DEFAULT_OPENAI_KEY_ENV);
        let api_key = resolve_secret(key_env)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::ExternalService(format!("Failed to create HTTP client for OpenAI: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
            strip_new_lines: config.strip_new_lines,
        })
    }

    fn prepare_inputs(&self, texts: &[String]) -> Vec<String> {
        if self.strip_new_lines {
            texts.iter().map(|t| t.replace('\n', " ")).collect()
        } else {
            texts.to_vec()
        }
    }

    #[instrument(skip(self, inputs), fields(batch_size = inputs.len(), model = %self.model))]
    async fn request_batch(&self, inputs: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalService(format!("Failed to send request to OpenAI: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(AppError::ExternalService(format!(
                "OpenAI API error ({}): {}",
                status, message
            )));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::ExternalService(format!("Failed to parse OpenAI response: {}", e))
        })?;

        order_embeddings(body.data, inputs.len(), self.dimensions)
    }
}

/// Put returned embeddings back into request order and check their shape.
fn order_embeddings(
    mut data: Vec<EmbeddingData>,
    expected: usize,
    dimensions: usize,
) -> AppResult<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(AppError::ExternalService(format!(
            "OpenAI returned {} embeddings for {} inputs",
            data.len(),
            expected
        )));
    }

    data.sort_by_key(|d| d.index);

    let mut embeddings = Vec::with_capacity(expected);
    for (position, item) in data.into_iter().enumerate() {
        if item.index != position {
            return Err(AppError::ExternalService(format!(
                "OpenAI response is missing the embedding for input {}",
                position
            )));
        }
        if item.embedding.len() != dimensions {
            return Err(AppError::ExternalService(format!(
                "Unexpected embedding dimensions: got {}, expected {}",
                item.embedding.len(),
                dimensions
            )));
        }
        embeddings.push(item.embedding);
    }

    Ok(embeddings)
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(texts = texts.len(), provider = "openai"))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs = self.prepare_inputs(texts);
        let mut embeddings = Vec::with_capacity(inputs.len());

        for batch in inputs.chunks(self.batch_size) {
            embeddings.extend(self.request_batch(batch).await?);
        }

        debug!("Generated {} embeddings", embeddings.len());
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(strip_new_lines: bool) -> OpenAiProvider {
        OpenAiProvider {
            client: Client::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: "test-key".to_string(),
            model: "text-embedding-ada-002".to_string(),
            dimensions: 3,
            batch_size: 2,
            strip_new_lines,
        }
    }

    fn data(index: usize, embedding: Vec<f32>) -> EmbeddingData {
        EmbeddingData { index, embedding }
    }

    #[test]
    fn test_prepare_inputs_strips_newlines() {
        let inputs = provider(true).prepare_inputs(&["a\nb\n".to_string()]);
        assert_eq!(inputs, vec!["a b ".to_string()]);

        let inputs = provider(false).prepare_inputs(&["a\nb".to_string()]);
        assert_eq!(inputs, vec!["a\nb".to_string()]);
    }

    #[test]
    fn test_request_shape() {
        let input = vec!["one".to_string(), "two".to_string()];
        let request = EmbeddingRequest {
            model: "text-embedding-ada-002",
            input: &input,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "text-embedding-ada-002", "input": ["one", "two"]})
        );
    }

    #[test]
    fn test_response_parsing_and_ordering() {
        let body = r#"{
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0, 0.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0, 0.0]}
            ],
            "model": "text-embedding-ada-002",
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }"#;
        let response: EmbeddingResponse = serde_json::from_str(body).unwrap();

        let embeddings = order_embeddings(response.data, 2, 3).unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    }

    #[test]
    fn test_order_embeddings_count_mismatch() {
        let result = order_embeddings(vec![data(0, vec![1.0, 0.0, 0.0])], 2, 3);
        assert!(matches!(result, Err(AppError::ExternalService(_))));
    }

    #[test]
    fn test_order_embeddings_duplicate_index() {
        let result = order_embeddings(
            vec![data(0, vec![1.0, 0.0, 0.0]), data(0, vec![0.0, 1.0, 0.0])],
            2,
            3,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_order_embeddings_dimension_mismatch() {
        let result = order_embeddings(vec![data(0, vec![1.0])], 1, 3);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unexpected embedding dimensions"));
    }

    #[test]
    fn test_error_body_parsing() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message, "Incorrect API key provided");
    }

    #[tokio::test]
    async fn test_embed_batch_live() {
        // Requires a real key; skipped otherwise.
        if std::env::var("OPENAI_API_KEY").is_err() {
            println!("Skipping test: OPENAI_API_KEY not set");
            return;
        }

        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            model: "text-embedding-ada-002".to_string(),
            dimensions: 1536,
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            ..Default::default()
        };
        let provider = OpenAiProvider::new(&config).unwrap();

        let embeddings = provider
            .embed_batch(&["First text".to_string(), "Second text".to_string()])
            .await
            .unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 1536);
    }
}
