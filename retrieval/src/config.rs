//! Configuration for the retrieval engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use semsearch_embeddings::catalog::DEFAULT_REMOTE_MODEL;
use semsearch_embeddings::{EmbeddingManager, LocalModel, ModelBinding};

use crate::error::{Result, RetrievalError};

/// Configuration for the retrieval engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Name of the active collection.
    pub collection_name: String,

    /// Directory collections are persisted to. `None` keeps them in memory.
    pub persist_dir: Option<PathBuf>,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Bulk load configuration.
    pub bulk: BulkConfig,

    /// Query configuration.
    pub query: QueryConfig,

    /// File ingestion configuration.
    pub ingest: IngestConfig,
}

impl RetrievalConfig {
    /// Create a new configuration with default values.
    pub fn new(collection_name: impl Into<String>) -> Self {
        Self {
            collection_name: collection_name.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a TOML file. Missing keys take their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RetrievalError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RetrievalError::Config(e.to_string()))
    }

    /// Set the persistence directory.
    pub fn with_persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_dir = Some(dir.into());
        self
    }

    /// Keep collections in memory only.
    pub fn in_memory(mut self) -> Self {
        self.persist_dir = None;
        self
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the bulk load configuration.
    pub fn with_bulk(mut self, config: BulkConfig) -> Self {
        self.bulk = config;
        self
    }

    /// Set the query configuration.
    pub fn with_query(mut self, config: QueryConfig) -> Self {
        self.query = config;
        self
    }

    /// Set the ingestion configuration.
    pub fn with_ingest(mut self, config: IngestConfig) -> Self {
        self.ingest = config;
        self
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            collection_name: "documents".to_string(),
            persist_dir: dirs::data_dir().map(|dir| dir.join("semsearch")),
            embedding: EmbeddingConfig::default(),
            bulk: BulkConfig::default(),
            query: QueryConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to use for embeddings. Each provider has its own default.
    pub model: Option<String>,

    /// API key for the remote provider. Falls back to `OPENAI_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    pub base_url: Option<String>,

    /// Vector size of the mock provider.
    pub mock_dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::Local,
            model: None,
            api_key: None,
            base_url: None,
            mock_dimensions: 384,
        }
    }
}

impl EmbeddingConfig {
    pub fn with_provider(mut self, provider: EmbeddingProviderType) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// The binding this configuration selects.
    pub fn binding(&self) -> ModelBinding {
        match self.provider {
            EmbeddingProviderType::Local => {
                let model = match self.model.as_deref() {
                    Some(name) => LocalModel::from_name(name).unwrap_or_else(|| {
                        warn!("Unknown local model {name}, falling back to default");
                        LocalModel::default()
                    }),
                    None => LocalModel::default(),
                };
                ModelBinding::local(model)
            }
            EmbeddingProviderType::Remote => ModelBinding::Remote {
                model: self
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_REMOTE_MODEL.to_string()),
                api_key: self.api_key.clone(),
                base_url: self.base_url.clone(),
            },
            EmbeddingProviderType::Mock => ModelBinding::mock(self.mock_dimensions),
        }
    }

    /// Build the embedding manager this configuration describes.
    pub fn build_manager(&self) -> Result<EmbeddingManager> {
        Ok(EmbeddingManager::new(self.binding())?)
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// In-process ONNX model.
    Local,
    /// OpenAI-compatible embeddings API.
    Remote,
    /// Deterministic token hashing, no model download.
    Mock,
}

/// Configuration for batched bulk loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Documents per encode+insert unit.
    pub chunk_size: usize,

    /// Sample file loaded by `add_sample_data`.
    pub sample_path: PathBuf,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            sample_path: PathBuf::from("data/sample_documents.json"),
        }
    }
}

/// Configuration for queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Number of results when the caller does not ask for a count.
    pub default_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { default_k: 5 }
    }
}

/// Configuration for turning files into documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Target chunk length in characters.
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks.
    pub overlap: usize,

    /// Texts shorter than this after whitespace cleanup are dropped.
    pub min_text_length: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
            min_text_length: 10,
        }
    }
}
