//! Configuration system for quarry.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::traits::{GraphStoreConfig, LlmConfig};

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Ollama,
    OpenAI,
}

/// Provider configuration with type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    /// Provider type.
    pub provider: LlmProvider,
    /// Provider-specific configuration.
    #[serde(flatten)]
    pub config: LlmConfig,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            config: LlmConfig::default(),
        }
    }
}

/// Extraction pipeline configuration. Duration knobs are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Concurrent extraction workers.
    pub workers: usize,
    /// Attempts per LLM call before degrading to an empty result.
    pub max_attempts: u32,
    /// Retries when a chunk parses to an empty result.
    pub max_retries: u32,
    /// Timeout for the first attempt on a chunk (cold-start tolerance).
    pub first_attempt_timeout_secs: u64,
    /// Timeout for every subsequent attempt.
    pub retry_timeout_secs: u64,
    /// A chunk silent for this long is reported as hung.
    pub hang_threshold_secs: u64,
    /// Interval between hang checks.
    pub poll_interval_secs: u64,
    /// Wall-clock budget for the whole batch.
    pub global_timeout_secs: u64,
    /// Directory for per-document extraction caches.
    pub cache_dir: PathBuf,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            max_attempts: 2,
            max_retries: 3,
            first_attempt_timeout_secs: 1200,
            retry_timeout_secs: 120,
            hang_threshold_secs: 300,
            poll_interval_secs: 30,
            global_timeout_secs: 86_400,
            cache_dir: PathBuf::from("extracted_data"),
        }
    }
}

impl ExtractionConfig {
    pub fn first_attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.first_attempt_timeout_secs)
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_secs(self.retry_timeout_secs)
    }

    pub fn hang_threshold(&self) -> Duration {
        Duration::from_secs(self.hang_threshold_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn global_timeout(&self) -> Duration {
        Duration::from_secs(self.global_timeout_secs)
    }
}

/// Duplicate resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Cap on entities fetched per label for detection.
    pub entity_limit: usize,
    /// Directory for saved plans and execution reports.
    pub plans_dir: PathBuf,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            entity_limit: 50,
            plans_dir: PathBuf::from("resolution_plans"),
        }
    }
}

/// Main quarry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarryConfig {
    /// LLM configuration.
    pub llm: LlmProviderConfig,
    /// Graph store configuration.
    pub graph_store: GraphStoreConfig,
    /// Extraction pipeline configuration.
    pub extraction: ExtractionConfig,
    /// Duplicate resolution configuration.
    pub dedup: DedupConfig,
}

impl QuarryConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::error::QuarryResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| crate::error::QuarryError::Configuration(e.to_string())),
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| crate::error::QuarryError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| crate::error::QuarryError::Configuration(e.to_string())),
            _ => Err(crate::error::QuarryError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // LLM configuration
        if let Ok(provider) = std::env::var("QUARRY_LLM_PROVIDER") {
            config.llm.provider = match provider.to_lowercase().as_str() {
                "openai" => LlmProvider::OpenAI,
                _ => LlmProvider::Ollama,
            };
        }
        if let Ok(model) = std::env::var("QUARRY_LLM_MODEL") {
            config.llm.config.model = model;
        }
        if let Ok(base_url) = std::env::var("QUARRY_LLM_BASE_URL") {
            config.llm.config.base_url = Some(base_url);
        }
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            config.llm.config.api_key = Some(api_key);
        }

        // Graph store configuration
        if let Ok(uri) = std::env::var("NEO4J_URI") {
            config.graph_store.url = uri;
        }
        if let Ok(username) = std::env::var("NEO4J_USERNAME") {
            config.graph_store.username = Some(username);
        }
        if let Ok(password) = std::env::var("NEO4J_PASSWORD") {
            config.graph_store.password = Some(password);
        }

        config
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> QuarryConfigBuilder {
        QuarryConfigBuilder::default()
    }
}

/// Builder for QuarryConfig.
#[derive(Default)]
pub struct QuarryConfigBuilder {
    config: QuarryConfig,
}

impl QuarryConfigBuilder {
    /// Set LLM configuration.
    pub fn llm(mut self, config: LlmProviderConfig) -> Self {
        self.config.llm = config;
        self
    }

    /// Set graph store configuration.
    pub fn graph_store(mut self, config: GraphStoreConfig) -> Self {
        self.config.graph_store = config;
        self
    }

    /// Set extraction configuration.
    pub fn extraction(mut self, config: ExtractionConfig) -> Self {
        self.config.extraction = config;
        self
    }

    /// Set duplicate resolution configuration.
    pub fn dedup(mut self, config: DedupConfig) -> Self {
        self.config.dedup = config;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> QuarryConfig {
        self.config
    }
}
