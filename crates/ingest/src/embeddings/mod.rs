//! Embedding providers.
//!
//! Provides provider-agnostic embedding generation. The provider is built
//! once per run from configuration and passed to the ingestion entry point.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
