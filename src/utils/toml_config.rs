//! TOML-based configuration for partition-rag
//!
//! This module provides declarative configuration for LLM providers, the
//! embedder, RAG parameters and the runnable scenarios via a TOML file
//! (`partition-rag.toml`).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure loaded from partition-rag.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Which provider answers prompts
    pub llm: LlmConfig,

    /// Named LLM provider configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Runnable scenarios, selected on the command line by id
    #[serde(default)]
    pub scenarios: Vec<ScenarioConfig>,
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Key into `[providers]`
    pub provider: String,

    /// Overrides the provider's `default_model`
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        default_model: String,
    },
    OpenAI {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        default_model: String,
    },
}

impl ProviderConfig {
    pub fn default_model(&self) -> &str {
        match self {
            ProviderConfig::Ollama { default_model, .. } => default_model,
            ProviderConfig::OpenAI { default_model, .. } => default_model,
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

// ============= Embedding Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmbeddingConfig {
    /// Any OpenAI-compatible `/embeddings` endpoint (OpenAI, Ollama, vLLM)
    Remote {
        #[serde(default = "default_embedding_url")]
        base_url: String,
        #[serde(default = "default_embedding_model")]
        model: String,
        /// Environment variable containing API key, if the endpoint needs one
        #[serde(default)]
        api_key_env: Option<String>,
        #[serde(default = "default_embedding_batch")]
        batch_size: usize,
    },
    /// In-process ONNX model (requires the `local-embeddings` feature)
    Fastembed {
        #[serde(default = "default_fastembed_model")]
        model: String,
    },
}

fn default_embedding_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_batch() -> usize {
    64
}

fn default_fastembed_model() -> String {
    "BGESmallENV15".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig::Remote {
            base_url: default_embedding_url(),
            model: default_embedding_model(),
            api_key_env: None,
            batch_size: default_embedding_batch(),
        }
    }
}

// ============= RAG Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_top_k")]
    pub similarity_top_k: usize,

    /// Stream answers token by token when a scenario does not say otherwise
    #[serde(default)]
    pub streaming: bool,

    /// Upper bound on a single sub-question dispatch
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_timeout_secs: u64,

    #[serde(default = "default_max_concurrent_builds")]
    pub max_concurrent_builds: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    3
}

fn default_dispatch_timeout() -> u64 {
    120
}

fn default_max_concurrent_builds() -> usize {
    4
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            similarity_top_k: default_top_k(),
            streaming: false,
            dispatch_timeout_secs: default_dispatch_timeout(),
            max_concurrent_builds: default_max_concurrent_builds(),
        }
    }
}

// ============= Storage Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Collection name used inside every partition's database
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "collection".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
        }
    }
}

// ============= Scenario Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub id: u32,
    pub name: String,
    pub persist_dir: PathBuf,

    /// Overrides `[rag].streaming`
    #[serde(default)]
    pub streaming: Option<bool>,

    #[serde(flatten)]
    pub mode: ScenarioMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScenarioMode {
    /// One index over every file in a folder
    Single { data_dir: PathBuf },
    /// One index per key plus the aggregate sub-question tool
    Partitioned {
        keys: Vec<String>,
        #[serde(default)]
        order: KeyOrder,
        /// Path with a `{key}` placeholder, e.g. `./data/UBER/UBER_{key}.html`
        source_template: String,
        /// Human description of the corpus used in tool descriptions
        corpus: String,
        #[serde(default = "default_metadata_key")]
        metadata_key: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyOrder {
    Ascending,
    #[default]
    Descending,
}

fn default_metadata_key() -> String {
    "year".to_string()
}

impl ScenarioConfig {
    pub fn streaming(&self, rag: &RagConfig) -> bool {
        self.streaming.unwrap_or(rag.streaming)
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Provider '{0}' referenced by {1} does not exist")]
    MissingProvider(String, String),

    #[error("Scenario id {0} is defined more than once")]
    DuplicateScenario(u32),

    #[error("Partition key '{0}' is listed more than once in scenario {1}")]
    DuplicateKey(String, u32),
}

impl AppConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Only the selected provider needs its credentials present
        let provider = self.get_provider(&self.llm.provider).ok_or_else(|| {
            ConfigError::MissingProvider(self.llm.provider.clone(), "[llm]".to_string())
        })?;
        if let ProviderConfig::OpenAI { api_key_env, .. } = provider {
            self.validate_env_var(api_key_env)?;
        }

        match &self.embedding {
            EmbeddingConfig::Remote {
                api_key_env,
                batch_size,
                ..
            } => {
                if let Some(env) = api_key_env {
                    self.validate_env_var(env)?;
                }
                if *batch_size == 0 {
                    return Err(ConfigError::ValidationError(
                        "embedding.batch_size must be greater than 0".to_string(),
                    ));
                }
            }
            EmbeddingConfig::Fastembed { .. } => {}
        }

        self.validate_rag()?;

        if self.storage.collection.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.collection must not be empty".to_string(),
            ));
        }

        self.validate_scenarios()
    }

    fn validate_rag(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;
        if rag.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "rag.chunk_size must be greater than 0".to_string(),
            ));
        }
        if rag.chunk_overlap >= rag.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                rag.chunk_overlap, rag.chunk_size
            )));
        }
        if rag.similarity_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "rag.similarity_top_k must be greater than 0".to_string(),
            ));
        }
        if rag.dispatch_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "rag.dispatch_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if rag.max_concurrent_builds == 0 {
            return Err(ConfigError::ValidationError(
                "rag.max_concurrent_builds must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_scenarios(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        for scenario in &self.scenarios {
            if !ids.insert(scenario.id) {
                return Err(ConfigError::DuplicateScenario(scenario.id));
            }

            if let ScenarioMode::Partitioned {
                keys,
                source_template,
                metadata_key,
                ..
            } = &scenario.mode
            {
                if keys.is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "scenario {} lists no partition keys",
                        scenario.id
                    )));
                }
                let mut seen = HashSet::new();
                for key in keys {
                    if key.is_empty() {
                        return Err(ConfigError::ValidationError(format!(
                            "scenario {} contains an empty partition key",
                            scenario.id
                        )));
                    }
                    if !seen.insert(key.as_str()) {
                        return Err(ConfigError::DuplicateKey(key.clone(), scenario.id));
                    }
                }
                if !source_template.contains("{key}") {
                    return Err(ConfigError::ValidationError(format!(
                        "scenario {} source_template must contain '{{key}}'",
                        scenario.id
                    )));
                }
                if metadata_key.is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "scenario {} metadata_key must not be empty",
                        scenario.id
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Get provider by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Model used for chat: `[llm].model` if set, else the provider default
    pub fn llm_model(&self) -> Option<&str> {
        self.llm
            .model
            .as_deref()
            .or_else(|| self.get_provider(&self.llm.provider).map(|p| p.default_model()))
    }

    /// Get scenario by id
    pub fn scenario(&self, id: u32) -> Option<&ScenarioConfig> {
        self.scenarios.iter().find(|s| s.id == id)
    }
}
