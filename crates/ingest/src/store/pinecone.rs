//! Pinecone vector store.
//!
//! Upserts go to `POST https://{host}/vectors/upsert` in batches of
//! [`UPSERT_BATCH_SIZE`]. When no host is configured it is looked up from
//! the control plane by index name.

use super::{UpsertRequest, VectorRecord, VectorStore};
use async_trait::async_trait;
use docingest_core::{config::resolve_secret, config::VectorStoreSettings, AppError, AppResult};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Control plane used to describe indexes
const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";

/// Pinecone REST API version header value
const API_VERSION: &str = "2024-07";

/// Maximum vectors per upsert request
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Pinecone data-plane client bound to one index host.
#[derive(Debug, Clone)]
pub struct PineconeStore {
    client: Client,
    host: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct UpsertBody<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct UpsertResponse {
    #[serde(rename = "upsertedCount")]
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

impl PineconeStore {
    /// Connect using the settings, resolving the index host if needed.
    pub async fn connect(settings: &VectorStoreSettings) -> AppResult<Self> {
        let api_key = resolve_secret(&settings.api_key_env)?;
        let client = build_client()?;

        let host = match settings.host.as_deref().filter(|h| !h.is_empty()) {
            Some(host) => host.to_string(),
            None => describe_index(&client, &api_key, &settings.index_name).await?,
        };

        info!("Using Pinecone index {} at {}", settings.index_name, host);
        Self::with_client(client, &host, api_key)
    }

    /// Client for a known index host.
    pub fn with_host(host: &str, api_key: impl Into<String>) -> AppResult<Self> {
        Self::with_client(build_client()?, host, api_key.into())
    }

    fn with_client(client: Client, host: &str, api_key: String) -> AppResult<Self> {
        let host = normalize_host(host);
        if host.is_empty() {
            return Err(AppError::Config("Pinecone index host is empty".to_string()));
        }

        Ok(Self {
            client,
            host,
            api_key,
        })
    }

    /// Base URL of the index, always with a scheme.
    pub fn host(&self) -> &str {
        &self.host
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        with_auth(builder, &self.api_key)
    }

    #[instrument(skip(self, vectors), fields(batch_size = vectors.len()))]
    async fn upsert_batch(&self, vectors: &[VectorRecord], namespace: &str) -> AppResult<usize> {
        let url = format!("{}/vectors/upsert", self.host);
        let body = UpsertBody { vectors, namespace };

        let response = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalService(format!("Failed to send request to Pinecone: {}", e))
            })?;

        let response = check_status(response).await?;
        let body: UpsertResponse = response.json().await.map_err(|e| {
            AppError::ExternalService(format!("Failed to parse Pinecone response: {}", e))
        })?;

        debug!("Pinecone upserted {} vectors", body.upserted_count);
        Ok(body.upserted_count)
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn upsert(&self, request: UpsertRequest<'_>) -> AppResult<usize> {
        let vectors = request.to_vectors()?;
        let namespace = request.options.namespace.as_str();

        let upserted =
            upsert_in_batches(&vectors, |batch| self.upsert_batch(batch, namespace)).await?;

        info!(
            "Upserted {} vectors into {} (namespace {:?})",
            upserted, request.options.index_name, namespace
        );
        Ok(upserted)
    }
}

/// Send vectors in order, [`UPSERT_BATCH_SIZE`] at a time, and sum the
/// counts reported for each batch. Stops at the first failed batch.
async fn upsert_in_batches<'a, F, Fut>(vectors: &'a [VectorRecord], mut send: F) -> AppResult<usize>
where
    F: FnMut(&'a [VectorRecord]) -> Fut,
    Fut: Future<Output = AppResult<usize>>,
{
    let mut upserted = 0;
    for batch in vectors.chunks(UPSERT_BATCH_SIZE) {
        upserted += send(batch).await?;
    }
    Ok(upserted)
}

fn build_client() -> AppResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| {
            AppError::ExternalService(format!("Failed to create HTTP client for Pinecone: {}", e))
        })
}

fn with_auth(builder: RequestBuilder, api_key: &str) -> RequestBuilder {
    builder
        .header("Api-Key", api_key)
        .header("X-Pinecone-API-Version", API_VERSION)
}

/// Look up the data-plane host of an index.
async fn describe_index(client: &Client, api_key: &str, index_name: &str) -> AppResult<String> {
    if index_name.is_empty() {
        return Err(AppError::Config(
            "A Pinecone index name is required to resolve its host".to_string(),
        ));
    }

    let url = format!("{}/indexes/{}", CONTROL_PLANE_URL, index_name);
    debug!("Describing Pinecone index at {}", url);

    let response = with_auth(client.get(&url), api_key)
        .send()
        .await
        .map_err(|e| {
            AppError::ExternalService(format!("Failed to reach Pinecone control plane: {}", e))
        })?;

    let response = check_status(response).await?;
    let body: DescribeIndexResponse = response.json().await.map_err(|e| {
        AppError::ExternalService(format!("Failed to parse Pinecone index description: {}", e))
    })?;

    Ok(body.host)
}

async fn check_status(response: reqwest::Response) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(AppError::ExternalService(format!(
        "Pinecone API error ({}): {}",
        status,
        error_message(&error_text)
    )))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.to_string())
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() || host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}
