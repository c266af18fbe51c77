//! Provider-agnostic embedding manager.
//!
//! The manager is bound to one `(provider, model)` pair for its whole
//! lifetime. Rebinding means constructing a new manager, which keeps every
//! vector produced by one instance in the same space.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::Embedding;
use crate::catalog::{self, CatalogEntry, LocalModel, ModelInfo, ProviderKind};
use crate::error::{EmbeddingError, Result};
use crate::mock::MockEmbeddingProvider;
use crate::provider::{EmbeddingProvider, OpenAIProvider};
use crate::similarity;

/// Which model the manager encodes with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ModelBinding {
    /// In-process model from the local catalog.
    Local { model: LocalModel },

    /// OpenAI-compatible API model. The key falls back to
    /// [`crate::provider::API_KEY_ENV`] when absent.
    Remote {
        model: String,
        #[serde(default, skip_serializing)]
        api_key: Option<String>,
        #[serde(default)]
        base_url: Option<String>,
    },

    /// Token-hashing provider producing `dimensions`-sized vectors.
    Mock { dimensions: usize },
}

impl ModelBinding {
    pub fn local(model: LocalModel) -> Self {
        Self::Local { model }
    }

    pub fn remote(model: impl Into<String>) -> Self {
        Self::Remote {
            model: model.into(),
            api_key: None,
            base_url: None,
        }
    }

    pub fn mock(dimensions: usize) -> Self {
        Self::Mock { dimensions }
    }

    pub fn provider_kind(&self) -> ProviderKind {
        match self {
            Self::Local { .. } => ProviderKind::Local,
            Self::Remote { .. } => ProviderKind::Remote,
            Self::Mock { .. } => ProviderKind::Mock,
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            Self::Local { model } => model.name(),
            Self::Remote { model, .. } => model,
            Self::Mock { .. } => MockEmbeddingProvider::MODEL_NAME,
        }
    }

    /// `<provider>/<model>`, the identity of the vector space this binding
    /// encodes into.
    pub fn key(&self) -> String {
        format!("{}/{}", self.provider_kind(), self.model_name())
    }
}

impl Default for ModelBinding {
    fn default() -> Self {
        Self::local(LocalModel::default())
    }
}

/// Encodes text with one bound provider and compares the resulting vectors.
#[derive(Clone)]
pub struct EmbeddingManager {
    binding: ModelBinding,
    provider: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for EmbeddingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingManager")
            .field("provider", &self.provider.name())
            .field("model", &self.binding.model_name())
            .finish()
    }
}

impl EmbeddingManager {
    /// Build the provider for `binding`. Fails when the model cannot be
    /// loaded or the remote credential is missing.
    pub fn new(binding: ModelBinding) -> Result<Self> {
        let provider: Arc<dyn EmbeddingProvider> = match &binding {
            ModelBinding::Local { model } => load_local(*model)?,
            ModelBinding::Remote {
                model,
                api_key,
                base_url,
            } => {
                let provider = match api_key {
                    Some(key) => OpenAIProvider::new(model.clone(), key.clone()),
                    None => OpenAIProvider::from_env(model.clone())?,
                };
                let provider = match base_url {
                    Some(url) => provider.with_base_url(url.clone()),
                    None => provider,
                };
                Arc::new(provider)
            }
            ModelBinding::Mock { dimensions } => Arc::new(MockEmbeddingProvider::new(*dimensions)),
        };

        debug!(
            provider = %binding.provider_kind(),
            model = binding.model_name(),
            "Embedding manager ready"
        );
        Ok(Self { binding, provider })
    }

    /// Wrap an already constructed provider. `binding` only describes it.
    pub fn with_provider(binding: ModelBinding, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { binding, provider }
    }

    /// Resolve `model_name` against the catalog, falling back to the default
    /// local model for names the catalog does not know.
    pub fn for_model(model_name: &str) -> Result<Self> {
        if let Some(model) = LocalModel::from_name(model_name) {
            return Self::new(ModelBinding::local(model));
        }
        if catalog::remote_dimensions(model_name).is_some() {
            return Self::new(ModelBinding::remote(model_name));
        }
        warn!("Unknown model {model_name}, falling back to default");
        Self::new(ModelBinding::default())
    }

    pub fn binding(&self) -> &ModelBinding {
        &self.binding
    }

    /// Output dimensionality, when the catalog or the provider knows it.
    pub fn dimensions(&self) -> Option<usize> {
        self.provider
            .dimension()
            .or_else(|| self.get_model_info().dimensions)
    }

    /// Encode `texts` into one vector each, in order.
    pub async fn encode(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.provider.embed_batch(texts).await.map_err(|e| {
            error!("Error encoding texts: {e}");
            match e {
                EmbeddingError::Encoding(_) => e,
                other => EmbeddingError::Encoding(other.to_string()),
            }
        })?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::Encoding(format!(
                "provider returned {} vectors for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }

        if let Some(expected) = self.dimensions() {
            if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: bad.len(),
                });
            }
        }

        debug!("Encoded {} texts", embeddings.len());
        Ok(embeddings)
    }

    /// Cosine similarity; 0.0 when either vector has zero norm.
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        similarity::cosine_similarity(a, b)
    }

    /// Cosine similarity of `query` against each candidate, in order.
    pub fn batch_similarity(&self, query: &[f32], candidates: &[Embedding]) -> Result<Vec<f32>> {
        similarity::batch_similarity(query, candidates)
    }

    /// Describe the bound model; unknown models get a placeholder record.
    pub fn get_model_info(&self) -> ModelInfo {
        if let ModelBinding::Mock { dimensions } = self.binding {
            return ModelInfo::known(dimensions, "Token-hashing encoder for tests", "none");
        }
        let provider = self.binding.provider_kind();
        let model = self.binding.model_name();
        catalog::lookup(provider, model).unwrap_or_else(|| ModelInfo::unknown(provider, model))
    }

    /// All models the manager can bind.
    pub fn list_available_models() -> Vec<CatalogEntry> {
        catalog::available_models()
    }

    /// Encode two texts and return their cosine similarity.
    pub async fn compare_texts(&self, first: &str, second: &str) -> Result<f32> {
        let embeddings = self
            .encode(&[first.to_string(), second.to_string()])
            .await?;
        match embeddings.as_slice() {
            [a, b] => self.similarity(a, b),
            _ => Ok(0.0),
        }
    }
}

#[cfg(feature = "local")]
fn load_local(model: LocalModel) -> Result<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::new(crate::local::LocalProvider::new(model, None)?))
}

#[cfg(not(feature = "local"))]
fn load_local(model: LocalModel) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(EmbeddingError::ModelLoad {
        model: model.name().to_string(),
        reason: "built without the `local` feature".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    fn mock_manager(dimensions: usize) -> EmbeddingManager {
        EmbeddingManager::with_provider(
            ModelBinding::local(LocalModel::AllMiniLmL6V2),
            Arc::new(MockEmbeddingProvider::new(dimensions)),
        )
    }

    /// Always answers with a single 2-d vector.
    struct ShortProvider {
        dimension: Option<usize>,
    }

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        fn name(&self) -> &str {
            "short"
        }

        fn model(&self) -> &str {
            "short"
        }

        fn dimension(&self) -> Option<usize> {
            self.dimension
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(vec![vec![1.0, 0.0]])
        }
    }

    struct UnreachableProvider;

    #[async_trait]
    impl EmbeddingProvider for UnreachableProvider {
        fn name(&self) -> &str {
            "unreachable"
        }

        fn model(&self) -> &str {
            "unreachable"
        }

        fn dimension(&self) -> Option<usize> {
            Some(2)
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
            Err(EmbeddingError::ApiRequest("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_encode_empty_is_empty() {
        let manager = mock_manager(384);
        assert!(manager.encode(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_encode_one_vector_per_text() {
        let manager = mock_manager(384);
        let texts = vec!["a cat".to_string(), "a dog".to_string(), "a cat".to_string()];
        let embeddings = manager.encode(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 3);
        assert_eq!(embeddings[0], embeddings[2]);
        assert!(embeddings.iter().all(|e| e.len() == 384));
    }

    #[tokio::test]
    async fn test_encode_rejects_wrong_dimensions() {
        let manager = EmbeddingManager::with_provider(
            ModelBinding::remote("custom"),
            Arc::new(ShortProvider { dimension: Some(3) }),
        );
        let err = manager.encode(&["text".to_string()]).await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_encode_rejects_count_mismatch() {
        let manager = EmbeddingManager::with_provider(
            ModelBinding::remote("custom"),
            Arc::new(ShortProvider { dimension: None }),
        );
        let err = manager
            .encode(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Encoding(_)));
    }

    #[tokio::test]
    async fn test_provider_failure_is_encoding_error() {
        let manager = EmbeddingManager::with_provider(
            ModelBinding::remote("custom"),
            Arc::new(UnreachableProvider),
        );
        let err = manager.encode(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Encoding(ref msg) if msg.contains("connection refused")));
    }

    #[test]
    fn test_similarity_contract() {
        let manager = mock_manager(4);
        let v = vec![0.5, -1.0, 2.0, 0.0];
        assert!((manager.similarity(&v, &v).unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(manager.similarity(&v, &[0.0; 4]).unwrap(), 0.0);
    }

    #[test]
    fn test_model_info_known_and_unknown() {
        let manager = mock_manager(384);
        let info = manager.get_model_info();
        assert_eq!(info.dimensions, Some(384));
        assert_eq!(info.size, "~80MB");

        let manager = EmbeddingManager::with_provider(
            ModelBinding::remote("in-house-embedder"),
            Arc::new(MockEmbeddingProvider::new(8)),
        );
        let info = manager.get_model_info();
        assert_eq!(info.dimensions, None);
        assert_eq!(info.size, "unknown");
    }

    #[test]
    fn test_remote_binding_with_explicit_key() {
        let binding = ModelBinding::Remote {
            model: "text-embedding-ada-002".to_string(),
            api_key: Some("sk-test".to_string()),
            base_url: Some("http://127.0.0.1:9".to_string()),
        };
        let manager = EmbeddingManager::new(binding).unwrap();
        assert_eq!(manager.dimensions(), Some(1536));
        assert_eq!(manager.binding().provider_kind(), ProviderKind::Remote);
    }

    #[tokio::test]
    async fn test_mock_binding() {
        let manager = EmbeddingManager::new(ModelBinding::mock(32)).unwrap();
        assert_eq!(manager.binding().provider_kind(), ProviderKind::Mock);
        assert_eq!(manager.binding().key(), "mock/mock-token-hash");
        assert_eq!(manager.dimensions(), Some(32));

        let info = manager.get_model_info();
        assert_eq!(info.dimensions, Some(32));
        assert!(!info.description.contains("remote"));

        let embeddings = manager.encode(&["hashed tokens".to_string()]).await.unwrap();
        assert_eq!(embeddings[0].len(), 32);
    }

    #[tokio::test]
    async fn test_compare_texts() {
        let manager = mock_manager(128);
        let same = manager.compare_texts("vector search", "vector search").await.unwrap();
        assert!((same - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_binding_serde() {
        let binding: ModelBinding = serde_json::from_str(
            r#"{"provider":"local","model":"all-mpnet-base-v2"}"#,
        )
        .unwrap();
        assert_eq!(binding, ModelBinding::local(LocalModel::AllMpnetBaseV2));

        let binding: ModelBinding =
            serde_json::from_str(r#"{"provider":"remote","model":"text-embedding-3-small"}"#)
                .unwrap();
        assert_eq!(binding, ModelBinding::remote("text-embedding-3-small"));

        let binding: ModelBinding =
            serde_json::from_str(r#"{"provider":"mock","dimensions":16}"#).unwrap();
        assert_eq!(binding, ModelBinding::mock(16));
    }
}
