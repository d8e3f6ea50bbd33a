//! Tests for the full read, chunk, embed and upsert flow.

use crate::chunk::ChunkMetadata;
use crate::embeddings::providers::MockProvider;
use crate::embeddings::EmbeddingProvider;
use crate::store::{SqliteStore, UpsertRequest, VectorStore};
use crate::{ingest, IngestReport};
use async_trait::async_trait;
use docingest_core::config::MalformedPolicy;
use docingest_core::{AppConfig, AppError, AppResult};
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// Store that remembers every request it receives.
#[derive(Default)]
struct RecordingStore {
    calls: Mutex<Vec<(Vec<String>, Vec<ChunkMetadata>, usize)>>,
}

impl RecordingStore {
    fn calls(&self) -> Vec<(Vec<String>, Vec<ChunkMetadata>, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    fn name(&self) -> &str {
        "recording"
    }

    async fn upsert(&self, request: UpsertRequest<'_>) -> AppResult<usize> {
        self.calls.lock().unwrap().push((
            request.texts.to_vec(),
            request.metadatas.to_vec(),
            request.embeddings.len(),
        ));
        Ok(request.texts.len())
    }
}

#[derive(Debug)]
struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn provider_name(&self) -> &str {
        "failing"
    }

    fn model_name(&self) -> &str {
        "none"
    }

    fn dimensions(&self) -> usize {
        8
    }

    async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Err(AppError::ExternalService("embedding service unavailable".to_string()))
    }
}

/// Embedder that drops the last vector.
#[derive(Debug)]
struct ShortEmbedder;

#[async_trait]
impl EmbeddingProvider for ShortEmbedder {
    fn provider_name(&self) -> &str {
        "short"
    }

    fn model_name(&self) -> &str {
        "none"
    }

    fn dimensions(&self) -> usize {
        2
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
    }
}

fn write_input(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

fn config_for(input: &NamedTempFile) -> AppConfig {
    AppConfig {
        input: input.path().to_path_buf(),
        article_host: "h".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_single_short_record() {
    let input = write_input(&[r#"{"_source":{"body":"hi","title":"T"},"_id":"42"}"#]);
    let store = RecordingStore::default();

    let report = ingest(&config_for(&input), &MockProvider::new(16), &store)
        .await
        .unwrap();

    assert_eq!(report.records, 1);
    assert_eq!(report.chunks, 1);
    assert_eq!(report.upserted, 1);

    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    let (texts, metadatas, embeddings) = &calls[0];
    assert_eq!(texts, &vec!["hi".to_string()]);
    assert_eq!(
        metadatas,
        &vec![ChunkMetadata {
            title: "T".to_string(),
            url: "https://h/articles.cfm?ID=42".to_string(),
        }]
    );
    assert_eq!(*embeddings, 1);
}

#[tokio::test]
async fn test_long_bodies_keep_parallel_sequences() {
    let long_body = "word ".repeat(600);
    let first = format!(
        r#"{{"_id":"1","_source":{{"title":"First","body":"{}"}}}}"#,
        long_body
    );
    let second = r#"{"_id":2,"_source":{"title":"Second","body":"short body"}}"#;
    let input = write_input(&[&first, second]);
    let store = RecordingStore::default();

    let report = ingest(&config_for(&input), &MockProvider::new(16), &store)
        .await
        .unwrap();

    let calls = store.calls();
    let (texts, metadatas, embeddings) = &calls[0];
    assert_eq!(texts.len(), metadatas.len());
    assert_eq!(texts.len(), *embeddings);
    assert_eq!(texts.len(), report.chunks);
    assert!(report.chunks >= 4);

    assert!(texts.iter().all(|t| t.chars().count() <= 1000));
    assert_eq!(metadatas.last().unwrap().url, "https://h/articles.cfm?ID=2");
    assert_eq!(texts.last().unwrap(), "short body");
    assert!(metadatas[..metadatas.len() - 1]
        .iter()
        .all(|m| m.title == "First"));
}

#[tokio::test]
async fn test_missing_body_fails_before_upsert() {
    let input = write_input(&[
        r#"{"_source":{"body":"fine","title":"A"},"_id":"1"}"#,
        r#"{"_source":{"title":"T"},"_id":"1"}"#,
    ]);
    let store = RecordingStore::default();

    let err = ingest(&config_for(&input), &MockProvider::new(16), &store)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::IngestionFailed(_)));
    assert!(err.to_string().starts_with("Failed to ingest your data"));
    assert!(matches!(err.root(), AppError::MalformedInput { line: 2, .. }));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_skip_policy_ingests_remaining_records() {
    let input = write_input(&[
        "not json",
        r#"{"_source":{"body":"kept","title":"K"},"_id":"7"}"#,
    ]);
    let mut config = config_for(&input);
    config.on_malformed = MalformedPolicy::Skip;
    let store = RecordingStore::default();

    let report = ingest(&config, &MockProvider::new(16), &store).await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.records, 1);
    assert_eq!(store.calls()[0].0, vec!["kept".to_string()]);
}

#[tokio::test]
async fn test_empty_input_skips_upsert() {
    let input = write_input(&[]);
    let store = RecordingStore::default();

    let report = ingest(&config_for(&input), &MockProvider::new(16), &store)
        .await
        .unwrap();

    assert_eq!(
        report,
        IngestReport {
            duration_secs: report.duration_secs,
            ..Default::default()
        }
    );
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_embedding_failure_is_wrapped() {
    let input = write_input(&[r#"{"_source":{"body":"hi"},"_id":"1"}"#]);
    let store = RecordingStore::default();

    let err = ingest(&config_for(&input), &FailingEmbedder, &store)
        .await
        .unwrap_err();

    match &err {
        AppError::IngestionFailed(inner) => {
            assert!(matches!(**inner, AppError::ExternalService(_)))
        }
        other => panic!("Expected IngestionFailed, got {:?}", other),
    }
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_short_embedding_response_is_rejected() {
    let input = write_input(&[
        r#"{"_source":{"body":"one"},"_id":"1"}"#,
        r#"{"_source":{"body":"two"},"_id":"2"}"#,
    ]);
    let store = RecordingStore::default();

    let err = ingest(&config_for(&input), &ShortEmbedder, &store)
        .await
        .unwrap_err();

    assert!(matches!(err.root(), AppError::Ingestion(_)));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_missing_input_file() {
    let mut config = AppConfig::default();
    config.input = "/no/such/exported_data.ndjson".into();
    let store = RecordingStore::default();

    let err = ingest(&config, &MockProvider::new(16), &store)
        .await
        .unwrap_err();

    assert!(matches!(err.root(), AppError::Io(_)));
}

#[tokio::test]
async fn test_ingest_into_sqlite() {
    let input = write_input(&[
        r#"{"_source":{"body":"first article","title":"One"},"_id":"1"}"#,
        r#"{"_source":{"body":"second article","title":"Two"},"_id":"2"}"#,
    ]);
    let mut config = config_for(&input);
    config.vector_store.namespace = "articles".to_string();
    let store = SqliteStore::in_memory().unwrap();

    let report = ingest(&config, &MockProvider::new(32), &store).await.unwrap();

    assert_eq!(report.upserted, 2);
    assert_eq!(store.count("articles").unwrap(), 2);

    let vectors = store.vectors("articles").unwrap();
    assert_eq!(vectors[1].text, "second article");
    assert_eq!(vectors[1].embedding.len(), 32);
    assert_eq!(vectors[1].metadata["title"], "Two");
    assert_eq!(vectors[1].metadata["url"], "https://h/articles.cfm?ID=2");
    assert_eq!(vectors[1].metadata["text"], "second article");
}
