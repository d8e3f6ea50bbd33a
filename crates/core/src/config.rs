//! Configuration management for the ingestion tool.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - A YAML config file (`ingest.yaml` or the path in `INGEST_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! Later sources win.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::logging::LogFormat;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ingest.yaml";

/// Default input file.
pub const DEFAULT_INPUT: &str = "exported_data.ndjson";

/// Environment variable read for the OpenAI key when none is configured.
pub const DEFAULT_OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

const KNOWN_EMBEDDING_PROVIDERS: [&str; 3] = ["openai", "ollama", "mock"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Newline-delimited JSON file to ingest
    pub input: PathBuf,

    /// Splitter settings
    pub chunking: ChunkingSettings,

    /// Host used to build the article URL stored with every chunk
    pub article_host: String,

    /// What to do with lines that cannot be parsed into a record
    pub on_malformed: MalformedPolicy,

    /// Embedding provider settings
    pub embedding: EmbeddingSettings,

    /// Vector store settings
    pub vector_store: VectorStoreSettings,

    /// Log level override
    pub log_level: Option<String>,

    /// Log line format
    pub log_format: LogFormat,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Policy for input lines that are not valid records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Abort the whole run (nothing is upserted).
    #[default]
    Fail,
    /// Log the line and continue with the next one.
    Skip,
}

impl std::str::FromStr for MalformedPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(MalformedPolicy::Fail),
            "skip" => Ok(MalformedPolicy::Skip),
            other => Err(AppError::Config(format!(
                "Unknown malformed-line policy: {}. Supported: fail, skip",
                other
            ))),
        }
    }
}

/// Chunking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    #[serde(rename = "chunkSize")]
    pub chunk_size: usize,

    #[serde(rename = "chunkOverlap")]
    pub chunk_overlap: usize,

    /// Separators from coarsest to finest. `None` uses the splitter defaults.
    pub separators: Option<Vec<String>>,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: None,
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// "openai", "ollama" or "mock"
    pub provider: String,

    pub model: String,

    pub dimensions: usize,

    /// Maximum number of texts per embedding request
    #[serde(rename = "batchSize")]
    pub batch_size: usize,

    /// Replace newlines with spaces before embedding
    #[serde(rename = "stripNewLines")]
    pub strip_new_lines: bool,

    /// Provider base URL override
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    #[serde(rename = "apiKeyEnv")]
    pub api_key_env: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-ada-002".to_string(),
            dimensions: 1536,
            batch_size: 512,
            strip_new_lines: true,
            endpoint: None,
            api_key_env: None,
        }
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Pinecone,
    Sqlite,
}

/// Vector store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    pub kind: StoreKind,

    /// Pinecone index name
    #[serde(rename = "indexName")]
    pub index_name: String,

    /// Namespace inside the index
    pub namespace: String,

    /// Pinecone data-plane host; resolved from the control plane when absent
    pub host: Option<String>,

    /// Environment variable holding the Pinecone API key
    #[serde(rename = "apiKeyEnv")]
    pub api_key_env: String,

    /// Database file for the sqlite backend
    pub path: Option<PathBuf>,

    /// Metadata key the chunk text is stored under
    #[serde(rename = "textKey")]
    pub text_key: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            kind: StoreKind::Pinecone,
            index_name: String::new(),
            namespace: String::new(),
            host: None,
            api_key_env: "PINECONE_API_KEY".to_string(),
            path: None,
            text_key: "text".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    input: Option<PathBuf>,
    chunking: Option<ChunkingSettings>,
    #[serde(rename = "articleHost")]
    article_host: Option<String>,
    #[serde(rename = "onMalformed")]
    on_malformed: Option<MalformedPolicy>,
    embedding: Option<EmbeddingSettings>,
    #[serde(rename = "vectorStore")]
    vector_store: Option<VectorStoreSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    format: Option<LogFormat>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            input: PathBuf::from(DEFAULT_INPUT),
            chunking: ChunkingSettings::default(),
            article_host: "localhost".to_string(),
            on_malformed: MalformedPolicy::Fail,
            embedding: EmbeddingSettings::default(),
            vector_store: VectorStoreSettings::default(),
            log_level: None,
            log_format: LogFormat::Pretty,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration, reading the given config file if provided.
    ///
    /// Without an explicit file, `INGEST_CONFIG` or `ingest.yaml` in the
    /// working directory is used when present.
    ///
    /// Environment variables:
    /// - `INGEST_CONFIG`: Path to config file
    /// - `INGEST_INPUT`: Input ndjson file
    /// - `INGEST_ARTICLE_HOST`: Host for article URLs
    /// - `INGEST_ON_MALFORMED`: `fail` or `skip`
    /// - `INGEST_EMBEDDING_PROVIDER`: Embedding provider
    /// - `PINECONE_INDEX_NAME`, `PINECONE_NAME_SPACE`, `PINECONE_INDEX_HOST`
    /// - `RUST_LOG`: Log level
    /// - `INGEST_LOG_FORMAT`: `pretty` or `json`
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use docingest_core::config::AppConfig;
    ///
    /// let config = AppConfig::load_from(None).expect("Failed to load config");
    /// println!("Input: {:?}", config.input);
    /// ```
    pub fn load_from(config_file: Option<&Path>) -> AppResult<Self> {
        let mut config = Self::default();

        config.config_file = config_file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("INGEST_CONFIG").ok().map(PathBuf::from));

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        config.apply_env(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(input) = config_file.input {
            result.input = input;
        }
        if let Some(chunking) = config_file.chunking {
            result.chunking = chunking;
        }
        if let Some(host) = config_file.article_host {
            result.article_host = host;
        }
        if let Some(policy) = config_file.on_malformed {
            result.on_malformed = policy;
        }
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(store) = config_file.vector_store {
            result.vector_store = store;
        }
        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply environment overrides using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(input) = lookup("INGEST_INPUT") {
            self.input = PathBuf::from(input);
        }
        if let Some(host) = lookup("INGEST_ARTICLE_HOST") {
            self.article_host = host;
        }
        if let Some(policy) = lookup("INGEST_ON_MALFORMED") {
            self.on_malformed = policy.parse()?;
        }
        if let Some(provider) = lookup("INGEST_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }
        if let Some(index) = lookup("PINECONE_INDEX_NAME") {
            self.vector_store.index_name = index;
        }
        if let Some(namespace) = lookup("PINECONE_NAME_SPACE") {
            self.vector_store.namespace = namespace;
        }
        if let Some(host) = lookup("PINECONE_INDEX_HOST") {
            self.vector_store.host = Some(host);
        }
        if let Some(level) = lookup("RUST_LOG") {
            self.log_level = Some(level);
        }
        if let Some(format) = lookup("INGEST_LOG_FORMAT") {
            self.log_format = format.parse()?;
        }
        if lookup("NO_COLOR").is_some() {
            self.no_color = true;
        }
        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    pub fn with_overrides(
        mut self,
        input: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(input) = input {
            self.input = input;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Validate the configuration before any I/O happens, reading required
    /// API keys from the process environment.
    pub fn validate(&self) -> AppResult<()> {
        self.validate_with(|key| std::env::var(key).ok())
    }

    /// Validate the configuration, looking up secrets with `lookup`.
    pub fn validate_with<F>(&self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.chunking.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be at least 1".to_string()));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        let provider = self.embedding.provider.as_str();
        if !KNOWN_EMBEDDING_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 || self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "Embedding dimensions and batchSize must be positive".to_string(),
            ));
        }

        match self.vector_store.kind {
            StoreKind::Pinecone => {
                if self.vector_store.index_name.is_empty() {
                    return Err(AppError::Config(
                        "Pinecone index name is not set (PINECONE_INDEX_NAME)".to_string(),
                    ));
                }
            }
            StoreKind::Sqlite => {
                if self.vector_store.path.is_none() {
                    return Err(AppError::Config(
                        "The sqlite vector store needs a database path".to_string(),
                    ));
                }
            }
        }

        if self.vector_store.text_key.is_empty() {
            return Err(AppError::Config("textKey must not be empty".to_string()));
        }

        for env_var in self.required_secrets() {
            if lookup(env_var).map_or(true, |value| value.is_empty()) {
                return Err(AppError::Config(format!(
                    "API key not found in environment variable: {}",
                    env_var
                )));
            }
        }

        Ok(())
    }

    /// Environment variables that must hold API keys for the selected
    /// embedding provider and vector store.
    pub fn required_secrets(&self) -> Vec<&str> {
        let mut secrets = Vec::new();
        if self.embedding.provider == "openai" {
            secrets.push(
                self.embedding
                    .api_key_env
                    .as_deref()
                    .unwrap_or(DEFAULT_OPENAI_KEY_ENV),
            );
        }
        if self.vector_store.kind == StoreKind::Pinecone {
            secrets.push(self.vector_store.api_key_env.as_str());
        }
        secrets
    }
}

/// Read a secret from the named environment variable.
pub fn resolve_secret(env_var: &str) -> AppResult<String> {
    match std::env::var(env_var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::Config(format!(
            "API key not found in environment variable: {}",
            env_var
        ))),
    }
}
