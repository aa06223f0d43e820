
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::crawler::FetchConfig;
use crate::crawler::browser::BrowserConfig;
use crate::database::{IndexSpec, Metric};
use crate::embeddings::chunking::ChunkingConfig;
use crate::retriever::RetrievalConfig;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const PINECONE_API_KEY_ENV: &str = "PINECONE_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub batch_size: u32,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            chat_model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            batch_size: 64,
            timeout_seconds: 60,
            retry_attempts: 3,
            retry_backoff_ms: 1000,
        }
    }
}

/// Which vector index service backs the assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IndexBackend {
    #[default]
    #[serde(rename = "pinecone")]
    Pinecone,
    #[serde(rename = "lancedb")]
    LanceDb,
    #[serde(rename = "memory")]
    Memory,
}

impl IndexBackend {
    pub const ALL: [Self; 3] = [Self::Pinecone, Self::LanceDb, Self::Memory];
}

impl fmt::Display for IndexBackend {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pinecone => "pinecone",
            Self::LanceDb => "lancedb",
            Self::Memory => "memory",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: IndexBackend,
    pub index_name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub cloud: String,
    pub region: String,
    pub controller_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub readiness_poll_interval_ms: u64,
    pub readiness_max_interval_ms: u64,
    pub readiness_max_attempts: u32,
    pub propagation_delay_ms: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            index_name: "serverless-index".to_string(),
            dimension: 1536,
            metric: Metric::DotProduct,
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            controller_url: "https://api.pinecone.io".to_string(),
            api_key: None,
            timeout_seconds: 30,
            readiness_poll_interval_ms: 1000,
            readiness_max_interval_ms: 8000,
            readiness_max_attempts: 30,
            propagation_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 2048)")]
    InvalidBatchSize(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid index name: {0:?} (lowercase letters, digits and '-' only)")]
    InvalidIndexName(String),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 20000)")]
    InvalidDimension(usize),
    #[error("Invalid {0}: cannot be empty")]
    EmptyField(&'static str),
    #[error("Invalid readiness polling: {0}")]
    InvalidReadinessPolling(String),
    #[error("Invalid browser timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidBrowserTimeout(u64),
    #[error("Invalid settle timeout: {0}ms (must be between 100 and 60000)")]
    InvalidSettleTimeout(u64),
    #[error("Invalid window dimensions: {0}x{1} (must be between 100 and 4000)")]
    InvalidWindowDimensions(u32, u32),
    #[error("Invalid chunk size: {0} (must be between 50 and 8000)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid chunk window length: {0} (must be between 1 and 100)")]
    InvalidWindowLength(usize),
    #[error("Invalid top-k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Missing API key: set it in the config file or the {0} environment variable")]
    MissingApiKey(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".partselect-assistant"))
            .or_else(|| dirs::data_dir().map(|data| data.join("partselect-assistant")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load the configuration from the default directory
    #[inline]
    pub fn load() -> Result<Self> {
        let config_dir = Self::config_dir().context("Failed to determine config directory")?;
        Self::load_from(config_dir)
    }

    #[inline]
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Directory holding the local LanceDB tables
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.openai.validate()?;
        self.vector_store.validate()?;
        self.browser.validate()?;
        self.fetch.validate()?;
        self.chunking.validate()?;
        self.retrieval.validate()?;
        Ok(())
    }
}

fn validate_http_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

pub(crate) fn validate_timeout(seconds: u64) -> Result<(), ConfigError> {
    if seconds == 0 || seconds > 600 {
        return Err(ConfigError::InvalidTimeout(seconds));
    }
    Ok(())
}

pub(crate) fn validate_retry_attempts(attempts: u32) -> Result<(), ConfigError> {
    if attempts == 0 || attempts > 10 {
        return Err(ConfigError::InvalidRetryAttempts(attempts));
    }
    Ok(())
}

/// Prefer the configured secret, fall back to the environment
fn resolve_secret<F>(
    configured: Option<&str>,
    env_var: &'static str,
    lookup: F,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    configured
        .map(str::to_string)
        .or_else(|| lookup(env_var))
        .filter(|key| !key.trim().is_empty())
        .ok_or(ConfigError::MissingApiKey(env_var))
}

impl OpenAiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url(&self.base_url)?;

        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 2048 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        validate_timeout(self.timeout_seconds)?;
        validate_retry_attempts(self.retry_attempts)?;

        Ok(())
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        validate_http_url(&self.base_url)
    }

    #[inline]
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    #[inline]
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Result<String, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        resolve_secret(self.api_key.as_deref(), OPENAI_API_KEY_ENV, lookup)
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn set_chat_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.chat_model = model;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_base_url(&mut self, base_url: String) -> Result<(), ConfigError> {
        validate_http_url(&base_url)?;
        self.base_url = base_url;
        Ok(())
    }
}

impl VectorStoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name_ok = !self.index_name.is_empty()
            && self
                .index_name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !name_ok {
            return Err(ConfigError::InvalidIndexName(self.index_name.clone()));
        }

        if self.dimension == 0 || self.dimension > 20_000 {
            return Err(ConfigError::InvalidDimension(self.dimension));
        }

        if self.cloud.trim().is_empty() {
            return Err(ConfigError::EmptyField("cloud"));
        }

        if self.region.trim().is_empty() {
            return Err(ConfigError::EmptyField("region"));
        }

        validate_http_url(&self.controller_url)?;
        validate_timeout(self.timeout_seconds)?;

        if self.readiness_poll_interval_ms > self.readiness_max_interval_ms {
            return Err(ConfigError::InvalidReadinessPolling(format!(
                "initial interval {}ms exceeds cap {}ms",
                self.readiness_poll_interval_ms, self.readiness_max_interval_ms
            )));
        }

        if self.readiness_max_attempts == 0 {
            return Err(ConfigError::InvalidReadinessPolling(
                "at least one readiness check is required".to_string(),
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    #[inline]
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Result<String, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        resolve_secret(self.api_key.as_deref(), PINECONE_API_KEY_ENV, lookup)
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Creation parameters for the configured index
    #[inline]
    pub fn index_spec(&self) -> IndexSpec {
        IndexSpec {
            name: self.index_name.clone(),
            dimension: self.dimension,
            metric: self.metric,
            cloud: self.cloud.clone(),
            region: self.region.clone(),
        }
    }

    pub fn set_index_name(&mut self, index_name: String) -> Result<(), ConfigError> {
        let candidate = Self {
            index_name: index_name.clone(),
            ..self.clone()
        };
        candidate.validate()?;
        self.index_name = index_name;
        Ok(())
    }

    pub fn set_dimension(&mut self, dimension: usize) -> Result<(), ConfigError> {
        if dimension == 0 || dimension > 20_000 {
            return Err(ConfigError::InvalidDimension(dimension));
        }
        self.dimension = dimension;
        Ok(())
    }
}
