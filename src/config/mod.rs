//! Configuration management for docent
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Qdrant connection URL
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    /// Environment variable name for Qdrant API key
    #[serde(default = "default_qdrant_api_key_env")]
    pub qdrant_api_key_env: String,

    /// Qdrant collection name
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Embedding backend configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Fragmentation configuration
    #[serde(default)]
    pub fragment: FragmentConfig,

    /// Context search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Google Drive configuration
    #[serde(default)]
    pub drive: DriveConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Endpoint URL (OpenAI-compatible embeddings API)
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Environment variable holding the API key
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Retries for failed/timed-out requests
    #[serde(default = "default_request_retries")]
    pub retries: usize,
}

/// Lookup the expected embedding dimension for a known model
pub fn embedding_dimension_for_model(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}

/// Fragmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentConfig {
    /// Maximum tokens per fragment
    #[serde(default = "default_fragment_max_tokens")]
    pub max_tokens: usize,
}

/// Context search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of matches fetched from the vector store
    #[serde(default = "default_search_top_k")]
    pub top_k: usize,

    /// Minimum similarity score (0.0 - 1.0)
    #[serde(default = "default_search_min_score")]
    pub min_score: f32,

    /// Relaxed score applied when fewer than `min_results` matches clear `min_score`
    #[serde(default = "default_search_fallback_score")]
    pub fallback_score: f32,

    /// Match count below which the relaxed score applies
    #[serde(default = "default_search_min_results")]
    pub min_results: usize,
}

/// Google Drive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Drive API base URL for file metadata and export
    #[serde(default = "default_drive_base_url")]
    pub base_url: String,

    /// Environment variable holding the Drive access token
    #[serde(default = "default_drive_token_env")]
    pub token_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for docent data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Directory holding uploaded blob documents
    pub documents_dir: PathBuf,

    /// Directory holding tracking/registry state blobs
    pub state_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            qdrant_url: default_qdrant_url(),
            qdrant_api_key_env: default_qdrant_api_key_env(),
            collection_name: default_collection_name(),
            embedding: EmbeddingConfig::default(),
            fragment: FragmentConfig::default(),
            search: SearchConfig::default(),
            drive: DriveConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
            api_key_env: default_embedding_api_key_env(),
            timeout_secs: default_request_timeout(),
            retries: default_request_retries(),
        }
    }
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_fragment_max_tokens(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_search_top_k(),
            min_score: default_search_min_score(),
            fallback_score: default_search_fallback_score(),
            min_results: default_search_min_results(),
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            base_url: default_drive_base_url(),
            token_env: default_drive_token_env(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl EmbeddingConfig {
    /// Resolve the effective embedding dimension based on the configured model
    pub fn resolved_dimension(&self) -> usize {
        if let Some(expected) = embedding_dimension_for_model(&self.model) {
            if expected != self.dimension {
                tracing::warn!(
                    "Embedding dimension {} does not match model '{}' ({}); using {}",
                    self.dimension,
                    self.model,
                    expected,
                    expected
                );
            }
            expected
        } else {
            self.dimension
        }
    }
}

impl Config {
    /// Get the default base directory for docent (~/.docent)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".docent")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    fn init_paths(&mut self, base: PathBuf) {
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            documents_dir: base.join("documents"),
            state_dir: base.join("state"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.init_paths(base);
        config.paths.config_file = config_path.to_path_buf();

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location, falling back to defaults
    /// when no config file has been written yet
    pub fn load_default() -> Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            let mut config = Config::default();
            config.init_paths(Self::default_base_dir());
            config.validate()?;
            Ok(config)
        }
    }

    /// Save configuration to its config file path
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.collection_name.is_empty() {
            return Err(Error::Config("collection_name cannot be empty".to_string()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding.dimension must be positive".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::Config(
                "embedding.batch_size must be positive".to_string(),
            ));
        }
        if self.fragment.max_tokens == 0 {
            return Err(Error::Config(
                "fragment.max_tokens must be positive".to_string(),
            ));
        }
        if self.search.top_k == 0 {
            return Err(Error::Config("search.top_k must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.search.min_score)
            || !(0.0..=1.0).contains(&self.search.fallback_score)
        {
            return Err(Error::Config(
                "search scores must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }
}
