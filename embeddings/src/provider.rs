//! Embedding providers.
//!
//! A provider turns a batch of texts into one vector per text. The remote
//! provider here talks to an OpenAI-compatible `/embeddings` endpoint; the
//! local one lives in [`crate::local`].

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Model this provider encodes with.
    fn model(&self) -> &str;

    /// Output dimensionality, when known ahead of the first call.
    fn dimension(&self) -> Option<usize>;

    /// Generate embeddings for multiple texts, one per input, same order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".to_string()))
    }
}

/// Environment variable holding the remote API credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default endpoint of the remote provider.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI embedding provider.
pub struct OpenAIProvider {
    /// API key.
    api_key: String,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model sent with every request.
    model: String,

    /// Expected output size.
    dimension: Option<usize>,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider for `model`.
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            dimension: crate::catalog::remote_dimensions(&model),
            model,
        }
    }

    /// Create a provider whose key comes from [`API_KEY_ENV`].
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            EmbeddingError::ProviderNotConfigured(format!("{API_KEY_ENV} is not set"))
        })?;
        Ok(Self::new(model, api_key))
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Generating batch embeddings for {} texts with model: {}",
            texts.len(),
            self.model
        );

        let body = serde_json::json!({
            "input": texts,
            "model": self.model,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "{status}: {error_text}"
            )));
        }

        let mut result: OpenAIEmbeddingResponse = response.json().await?;

        if result.data.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        // The API may answer out of order; `index` is authoritative.
        result.data.sort_by_key(|item| item.index);
        let embeddings: Vec<Embedding> =
            result.data.into_iter().map(|item| item.embedding).collect();

        if let Some(usage) = result.usage {
            debug!("Embedding request used {} tokens", usage.total_tokens);
        }
        info!("Generated {} batch embeddings", embeddings.len());

        Ok(embeddings)
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    total_tokens: u64,
}
