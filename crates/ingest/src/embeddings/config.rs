//! Embedding configuration resolved from application settings.

use docingest_core::{
    config::{EmbeddingSettings, DEFAULT_OPENAI_KEY_ENV},
    AppError, AppResult,
};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Runtime embedding configuration with provider defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "openai", "ollama", "mock"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Maximum texts per request
    pub batch_size: usize,

    /// Replace newlines with spaces before embedding
    pub strip_new_lines: bool,

    /// Base URL of the provider API
    pub endpoint: String,

    /// Environment variable holding the API key, if the provider needs one
    pub api_key_env: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            batch_size: 512,
            strip_new_lines: true,
            endpoint: String::new(),
            api_key_env: None,
        }
    }
}

impl EmbeddingConfig {
    /// Resolve settings into a runtime config.
    ///
    /// `OLLAMA_URL` overrides the default Ollama endpoint when no endpoint is
    /// configured.
    pub fn from_settings(settings: &EmbeddingSettings) -> AppResult<Self> {
        let (endpoint, api_key_env) = match settings.provider.as_str() {
            "openai" => (
                settings
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
                Some(
                    settings
                        .api_key_env
                        .clone()
                        .unwrap_or_else(|| DEFAULT_OPENAI_KEY_ENV.to_string()),
                ),
            ),
            "ollama" => (
                settings.endpoint.clone().unwrap_or_else(|| {
                    std::env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string())
                }),
                settings.api_key_env.clone(),
            ),
            "mock" => (String::new(), None),
            other => {
                return Err(AppError::Config(format!(
                    "Unknown embedding provider: '{}'. Supported providers: openai, ollama, mock",
                    other
                )))
            }
        };

        if settings.batch_size == 0 {
            return Err(AppError::Config("Embedding batchSize must be positive".to_string()));
        }

        Ok(Self {
            provider: settings.provider.clone(),
            model: settings.model.clone(),
            dimensions: settings.dimensions,
            batch_size: settings.batch_size,
            strip_new_lines: settings.strip_new_lines,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key_env,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_defaults() {
        let config = EmbeddingConfig::from_settings(&EmbeddingSettings::default()).unwrap();

        assert_eq!(config.provider, "openai");
        assert_eq!(config.endpoint, "https://api.openai.com/v1");
        assert_eq!(config.api_key_env.as_deref(), Some("OPENAI_API_KEY"));
        assert_eq!(config.dimensions, 1536);
    }

    #[test]
    fn test_custom_endpoint_is_trimmed() {
        let settings = EmbeddingSettings {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            endpoint: Some("http://gpu-box:11434/".to_string()),
            ..Default::default()
        };
        let config = EmbeddingConfig::from_settings(&settings).unwrap();

        assert_eq!(config.endpoint, "http://gpu-box:11434");
        assert!(config.api_key_env.is_none());
    }

    #[test]
    fn test_unknown_provider() {
        let settings = EmbeddingSettings {
            provider: "cohere".to_string(),
            ..Default::default()
        };
        let result = EmbeddingConfig::from_settings(&settings);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }
}
