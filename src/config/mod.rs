// Configuration management
// Groups the tunable knobs of the retrieval engine and validates them
// before any index is touched. An optional `rag.toml` rides next to the
// index data; defaults work without one.

#[cfg(test)]
mod tests;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::chunker::ChunkingConfig;
use crate::embedder::DEFAULT_EMBEDDING_DIMENSION;
use crate::index::Bm25Params;
use crate::search::HybridConfig;
use crate::text::TokenizerOptions;

const CONFIG_FILE_NAME: &str = "rag.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    pub embedder: EmbedderConfig,
    pub chunking: ChunkingConfig,
    pub tokenizer: TokenizerOptions,
    pub bm25: Bm25Params,
    pub hybrid: HybridConfig,
}

impl Default for RagConfig {
    #[inline]
    fn default() -> Self {
        Self {
            embedder: EmbedderConfig::default(),
            chunking: ChunkingConfig::default(),
            tokenizer: TokenizerOptions::default(),
            bm25: Bm25Params::default(),
            hybrid: HybridConfig::default(),
        }
    }
}

/// Connection settings for the out-of-process embedding server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbedderConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub dimension: usize,
    pub timeout_secs: u64,
    /// Command used to launch the embedder when it is down; first element
    /// is the program, the rest its arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_command: Option<Vec<String>>,
}

impl Default for EmbedderConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 8765,
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout_secs: 30,
            startup_command: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid embedder URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(usize),
    #[error("Invalid embedder timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid chunk size: {0} lines (must be at least 1)")]
    InvalidChunkLines(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid chunk character bound: {0} (must be at least 1)")]
    InvalidChunkChars(usize),
    #[error("Invalid BM25 parameter {0}: {1} (must be non-negative)")]
    InvalidBm25Param(&'static str, f64),
    #[error("Negative search weight: {0}")]
    NegativeWeight(f64),
    #[error("Search weights must not both be zero")]
    ZeroWeights,
    #[error("Invalid top_k: must be positive")]
    InvalidTopK,
    #[error("Invalid expansion factor: must be positive")]
    InvalidExpansionFactor,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl RagConfig {
    /// Load `rag.toml` from `config_dir`, falling back to defaults when the
    /// file does not exist.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Write the configuration as pretty TOML into `config_dir`.
    #[inline]
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(config_dir.as_ref()).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.as_ref().display()
            )
        })?;

        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedder.validate()?;
        self.validate_chunking()?;
        self.validate_bm25()?;
        self.validate_hybrid()?;
        Ok(())
    }

    fn validate_chunking(&self) -> Result<(), ConfigError> {
        if self.chunking.max_lines == 0 {
            return Err(ConfigError::InvalidChunkLines(self.chunking.max_lines));
        }
        if self.chunking.overlap_lines >= self.chunking.max_lines {
            return Err(ConfigError::OverlapTooLarge(
                self.chunking.overlap_lines,
                self.chunking.max_lines,
            ));
        }
        if self.chunking.max_chars == 0 {
            return Err(ConfigError::InvalidChunkChars(self.chunking.max_chars));
        }
        Ok(())
    }

    fn validate_bm25(&self) -> Result<(), ConfigError> {
        if self.bm25.k1 < 0.0 {
            return Err(ConfigError::InvalidBm25Param("k1", self.bm25.k1));
        }
        if self.bm25.b < 0.0 {
            return Err(ConfigError::InvalidBm25Param("b", self.bm25.b));
        }
        if self.bm25.epsilon < 0.0 {
            return Err(ConfigError::InvalidBm25Param("epsilon", self.bm25.epsilon));
        }
        Ok(())
    }

    fn validate_hybrid(&self) -> Result<(), ConfigError> {
        if self.hybrid.bm25_weight < 0.0 {
            return Err(ConfigError::NegativeWeight(self.hybrid.bm25_weight));
        }
        if self.hybrid.vector_weight < 0.0 {
            return Err(ConfigError::NegativeWeight(self.hybrid.vector_weight));
        }
        if self.hybrid.bm25_weight == 0.0 && self.hybrid.vector_weight == 0.0 {
            return Err(ConfigError::ZeroWeights);
        }
        if self.hybrid.top_k == 0 {
            return Err(ConfigError::InvalidTopK);
        }
        if self.hybrid.expansion_factor == 0 {
            return Err(ConfigError::InvalidExpansionFactor);
        }
        Ok(())
    }
}

impl EmbedderConfig {
    /// Base URL of the embedding server.
    #[inline]
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url).map_err(|e| ConfigError::InvalidUrl(format!("{url}: {e}")))
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        if self.dimension < 64 || self.dimension > 4096 {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }
        self.base_url()?;
        Ok(())
    }
}
