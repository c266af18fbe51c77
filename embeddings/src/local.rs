//! Local embedding provider using fastembed (ONNX Runtime).
//!
//! Model files are downloaded on first use into the fastembed cache
//! directory, which can be overridden with `FASTEMBED_CACHE_DIR`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use tokio::sync::Mutex;
use tracing::info;

use crate::Embedding;
use crate::catalog::LocalModel;
use crate::error::{EmbeddingError, Result};
use crate::provider::EmbeddingProvider;

/// Environment variable overriding where model files are cached.
pub const CACHE_DIR_ENV: &str = "FASTEMBED_CACHE_DIR";

fn fastembed_model(model: LocalModel) -> EmbeddingModel {
    match model {
        LocalModel::AllMiniLmL6V2 => EmbeddingModel::AllMiniLML6V2,
        LocalModel::AllMpnetBaseV2 => EmbeddingModel::AllMpnetBaseV2,
        LocalModel::ParaphraseMultilingualMiniLmL12V2 => EmbeddingModel::ParaphraseMLMiniLML12V2,
    }
}

/// In-process embedding provider.
///
/// `TextEmbedding::embed` needs `&mut self`, so the model sits behind a
/// mutex and inference runs on the blocking pool.
pub struct LocalProvider {
    model: Arc<Mutex<TextEmbedding>>,
    local_model: LocalModel,
}

impl LocalProvider {
    /// Load `model`, downloading it if it is not cached yet.
    pub fn new(model: LocalModel, cache_dir: Option<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.or_else(|| {
            std::env::var(CACHE_DIR_ENV)
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        });

        let mut options =
            TextInitOptions::new(fastembed_model(model)).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let embedding = TextEmbedding::try_new(options).map_err(|e| EmbeddingError::ModelLoad {
            model: model.name().to_string(),
            reason: e.to_string(),
        })?;

        info!(
            model = model.name(),
            dimensions = model.dimensions(),
            "Loaded local embedding model"
        );

        Ok(Self {
            model: Arc::new(Mutex::new(embedding)),
            local_model: model,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn model(&self) -> &str {
        self.local_model.name()
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.local_model.dimensions())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model.clone();
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model.blocking_lock();
            model.embed(texts, None)
        })
        .await
        .map_err(|e| EmbeddingError::Encoding(format!("inference task failed: {e}")))?
        .map_err(|e| EmbeddingError::Encoding(e.to_string()))
    }
}
