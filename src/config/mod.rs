//! Configuration management for Folio
//!
//! Loads the TOML configuration, applies `FOLIO_SECTION__KEY` environment
//! overrides and named profiles, and validates the result.

use crate::chunking::{ChunkPolicy, DEFAULT_CHUNK_SIZE_WORDS, DEFAULT_OVERLAP_WORDS};
use crate::embedding::local_model_dimension;
use crate::error::{FolioError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    pub retrieval: RetrievalConfig,
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub pool_size: u32,
    /// Upper bound for a single store call (pool checkout and lock waits)
    pub timeout_ms: u64,
}

/// Transcript chunking policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size_words: usize,
    pub overlap_words: usize,
}

impl ChunkingConfig {
    pub fn policy(&self) -> Result<ChunkPolicy> {
        ChunkPolicy::new(self.chunk_size_words, self.overlap_words)
    }
}

/// Embedding generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String, // "openai" or "fastembed"
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    /// Switch provider, taking that provider's model, key variable, endpoint
    /// and dimension; the timeout is kept
    pub fn switch_provider(&mut self, provider: &str) {
        if self.provider == provider {
            return;
        }
        self.provider = provider.to_string();
        match provider {
            "openai" => {
                self.model = OPENAI_EMBEDDING_MODEL.to_string();
                self.api_key_env = OPENAI_KEY_ENV.to_string();
                self.base_url = OPENAI_BASE_URL.to_string();
                self.dimension = OPENAI_EMBEDDING_DIMENSION;
            }
            "fastembed" => {
                self.model = LOCAL_EMBEDDING_MODEL.to_string();
                self.api_key_env = String::new();
                self.base_url = String::new();
                self.dimension = local_model_dimension(LOCAL_EMBEDDING_MODEL).unwrap_or(384);
            }
            _ => {}
        }
    }

    /// Set the model; local models also fix the dimension
    pub fn set_model(&mut self, model: &str) {
        if self.provider == "fastembed" {
            if let Some(dimension) = local_model_dimension(model) {
                self.dimension = dimension;
            }
        }
        self.model = model.to_string();
    }
}

/// Completion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String, // "gemini" or "openai"
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Switch provider, taking that provider's model, key variable and
    /// endpoint; sampling settings and the timeout are kept
    pub fn switch_provider(&mut self, provider: &str) {
        if self.provider == provider {
            return;
        }
        self.provider = provider.to_string();
        match provider {
            "gemini" => {
                self.model = GEMINI_CHAT_MODEL.to_string();
                self.api_key_env = GEMINI_KEY_ENV.to_string();
                self.base_url = GEMINI_BASE_URL.to_string();
            }
            "openai" => {
                self.model = OPENAI_CHAT_MODEL.to_string();
                self.api_key_env = OPENAI_KEY_ENV.to_string();
                self.base_url = OPENAI_BASE_URL.to_string();
            }
            _ => {}
        }
    }
}

/// Audio transcription, always served by Gemini
///
/// Kept apart from `[llm]` so switching the answer model never sends audio
/// or keys to another provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: GEMINI_AUDIO_MODEL.to_string(),
            api_key_env: GEMINI_KEY_ENV.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
            timeout_secs: 120,
        }
    }
}

pub(crate) const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";
const OPENAI_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const OPENAI_EMBEDDING_DIMENSION: usize = 1536;
const LOCAL_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
const OPENAI_CHAT_MODEL: &str = "gpt-3.5-turbo";
const GEMINI_CHAT_MODEL: &str = "gemini-1.5-pro-latest";
const GEMINI_AUDIO_MODEL: &str = "gemini-2.5-flash-preview-04-17";

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Commit each run in a single transaction instead of chunk by chunk
    pub atomic: bool,
    pub queue_capacity: usize,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dimension: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atomic_ingestion: Option<bool>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FolioError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| FolioError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| FolioError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| FolioError::Config(format!("Unknown profile: {}", profile)))?;

        // Provider switches come first so explicit fields win over its defaults
        if let Some(provider) = &overrides.embedding_provider {
            self.embedding.switch_provider(provider);
        }
        if let Some(model) = &overrides.embedding_model {
            self.embedding.set_model(model);
        }
        if let Some(base_url) = overrides.embedding_base_url {
            self.embedding.base_url = base_url;
        }
        if let Some(api_key_env) = overrides.embedding_api_key_env {
            self.embedding.api_key_env = api_key_env;
        }
        if let Some(dimension) = overrides.embedding_dimension {
            self.embedding.dimension = dimension;
        }

        if let Some(provider) = &overrides.llm_provider {
            self.llm.switch_provider(provider);
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(api_key_env) = overrides.llm_api_key_env {
            self.llm.api_key_env = api_key_env;
        }
        if let Some(atomic) = overrides.atomic_ingestion {
            self.ingestion.atomic = atomic;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: FOLIO_SECTION__KEY=value
    /// Provider switches are applied before the other keys
    pub fn apply_env_overrides(&mut self) {
        let mut overrides: Vec<(String, String)> = std::env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix("FOLIO_")
                    .map(|config_key| (config_key.to_string(), value))
            })
            .collect();
        overrides.sort_by_key(|(key, _)| (!key.ends_with("__PROVIDER"), key.clone()));

        for (key, value) in overrides {
            if let Err(e) = self.set_value_from_env(&key, &value) {
                tracing::warn!("Failed to apply env override FOLIO_{}: {}", key, e);
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATABASE_PATH" => {
                self.storage.database_path = PathBuf::from(value);
            }
            "EMBEDDING__PROVIDER" => {
                self.embedding.switch_provider(value);
            }
            "EMBEDDING__MODEL" => {
                self.embedding.set_model(value);
            }
            "EMBEDDING__BASE_URL" => {
                self.embedding.base_url = value.to_string();
            }
            "LLM__PROVIDER" => {
                self.llm.switch_provider(value);
            }
            "LLM__MODEL" => {
                self.llm.model = value.to_string();
            }
            "LLM__BASE_URL" => {
                self.llm.base_url = value.to_string();
            }
            "TRANSCRIPTION__MODEL" => {
                self.transcription.model = value.to_string();
            }
            "TRANSCRIPTION__BASE_URL" => {
                self.transcription.base_url = value.to_string();
            }
            "RETRIEVAL__TOP_K" => {
                self.retrieval.top_k = parse_env(path, value)?;
            }
            "INGESTION__ATOMIC" => {
                self.ingestion.atomic = parse_env(path, value)?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| FolioError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("folio").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| FolioError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".folio"))
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| FolioError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                database_path: PathBuf::from("~/.folio/folio.sqlite"),
                pool_size: 8,
                timeout_ms: 3000,
            },
            chunking: ChunkingConfig {
                chunk_size_words: DEFAULT_CHUNK_SIZE_WORDS,
                overlap_words: DEFAULT_OVERLAP_WORDS,
            },
            embedding: EmbeddingConfig {
                provider: "openai".to_string(),
                model: OPENAI_EMBEDDING_MODEL.to_string(),
                api_key_env: OPENAI_KEY_ENV.to_string(),
                base_url: OPENAI_BASE_URL.to_string(),
                dimension: OPENAI_EMBEDDING_DIMENSION,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: "gemini".to_string(),
                model: GEMINI_CHAT_MODEL.to_string(),
                api_key_env: GEMINI_KEY_ENV.to_string(),
                base_url: GEMINI_BASE_URL.to_string(),
                temperature: 0.7,
                max_tokens: 1000,
                timeout_secs: 120,
            },
            transcription: TranscriptionConfig::default(),
            retrieval: RetrievalConfig { top_k: 5 },
            ingestion: IngestionConfig {
                atomic: false,
                queue_capacity: 64,
            },
            profiles: HashMap::new(),
        }
    }
}
