//! Configuration management for recruitrag
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.recruitrag/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{Result, RetrievalError};

/// Complete configuration snapshot for one retrieval stack
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// First-stage search and fusion parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidates fetched per method before fusion
    pub hybrid_search_k: usize,
    /// RRF damping constant
    pub rrf_k: u32,
    /// Results kept after fusion
    pub final_k: usize,
    /// Trigram similarity floor for lexical search
    pub lexical_threshold: f32,
    /// Fuse the lexical list alone when the embedder fails
    pub lexical_fallback: bool,
}

/// Cross-encoder reranker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    pub enabled: bool,
    /// HuggingFace model identifier
    pub model: String,
    pub top_k: usize,
    pub use_fp16: bool,
    /// Max tokens per (query, document) pair
    pub max_length: usize,
    /// External bound on scoring latency; expiry falls back to fused order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama `/api/embed` over HTTP
    Ollama,
    /// In-process candle BERT model
    Local,
}

/// Embedding provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub timeout_secs: u64,
}

/// Document store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub collection: String,
    pub style_collection: String,
    /// Page size used when scrolling payloads for lexical scoring
    pub scroll_page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            hybrid_search_k: 20,
            rrf_k: 50,
            final_k: 10,
            lexical_threshold: 0.1,
            lexical_fallback: false,
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "BAAI/bge-reranker-base".to_string(),
            top_k: 5,
            use_fp16: true,
            max_length: 512,
            timeout_ms: None,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            host: "127.0.0.1".to_string(),
            port: 11434,
            model: "nomic-embed-text".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            collection: "documents".to_string(),
            style_collection: "style_profiles".to_string(),
            scroll_page_size: 256,
        }
    }
}

impl RetrievalConfig {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RetrievalError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: RetrievalConfig = toml::from_str(&contents)
            .map_err(|e| RetrievalError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from ~/.recruitrag/config.toml when present, else built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(RetrievalConfig::default())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".recruitrag").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.search.hybrid_search_k == 0 || self.search.final_k == 0 {
            return Err(RetrievalError::ConfigError(
                "hybrid_search_k and final_k must be greater than 0".to_string(),
            ));
        }

        if self.search.rrf_k == 0 {
            return Err(RetrievalError::ConfigError(
                "rrf_k must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.search.lexical_threshold) {
            return Err(RetrievalError::ConfigError(
                "lexical_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.reranker.top_k == 0 {
            return Err(RetrievalError::ConfigError(
                "reranker.top_k must be greater than 0".to_string(),
            ));
        }

        // Fusion degenerates to a single list's order when the pool is no
        // larger than the output
        if self.search.hybrid_search_k <= self.search.final_k {
            tracing::warn!(
                hybrid_search_k = self.search.hybrid_search_k,
                final_k = self.search.final_k,
                "hybrid_search_k should exceed final_k for fusion to have signal"
            );
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RetrievalError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RetrievalError::ConfigError(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| RetrievalError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Base URL of the embedding service
    pub fn embedding_url(&self) -> String {
        format!("http://{}:{}", self.embedding.host, self.embedding.port)
    }
}
