//! Error types for the ingestion tool.
//!
//! This module defines a unified error enum that covers every failure the
//! pipeline can hit: configuration, I/O, malformed input records, and the
//! external embedding / vector store services.

use thiserror::Error;

/// Unified error type for the ingestion tool.
///
/// All functions in the application return `Result<T, AppError>`.
/// Errors are propagated, never turned into panics.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line of the input file could not be turned into a record
    #[error("Malformed input at line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },

    /// Embedding provider or vector store failures
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Broken pipeline invariants (mismatched batch lengths and the like)
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Top-level wrapper for any failure during a run.
    #[error("Failed to ingest your data: {0}")]
    IngestionFailed(#[source] Box<AppError>),
}

impl AppError {
    /// Wrap this error as a failed ingestion run.
    ///
    /// Already wrapped errors are returned unchanged.
    pub fn into_ingestion_failure(self) -> Self {
        match self {
            AppError::IngestionFailed(_) => self,
            other => AppError::IngestionFailed(Box::new(other)),
        }
    }

    /// The underlying error, looking through `IngestionFailed`.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::IngestionFailed(inner) => inner.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
