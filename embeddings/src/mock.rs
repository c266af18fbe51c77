//! Deterministic embedding provider that needs no model or network.
//!
//! Every lowercase alphanumeric token is hashed into one of `dimensions`
//! buckets with a hash-derived sign, and the bucket counts are L2-normalized.
//! Identical texts map to identical vectors and texts sharing words score
//! above unrelated ones, which is enough for tests and offline demos.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::Embedding;
use crate::error::Result;
use crate::provider::EmbeddingProvider;
use crate::similarity::normalize;

/// Token-hashing embedding provider.
///
/// # Example
///
/// ```rust
/// use semsearch_embeddings::{EmbeddingProvider, MockEmbeddingProvider};
///
/// # tokio_test::block_on(async {
/// let provider = MockEmbeddingProvider::new(64);
/// let embedding = provider.embed("vector search").await.unwrap();
/// assert_eq!(embedding.len(), 64);
/// assert_eq!(embedding, provider.embed("Vector SEARCH").await.unwrap());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub const MODEL_NAME: &'static str = "mock-token-hash";

    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Embedding {
        let mut embedding = vec![0.0f32; self.dimensions];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let hash = hasher.finish();

            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        normalize(&mut embedding);
        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        Self::MODEL_NAME
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_deterministic() {
        let provider = MockEmbeddingProvider::new(64);
        let a = provider.embed("Hello world").await.unwrap();
        let b = provider.embed("hello   WORLD").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_shared_words_score_higher() {
        let provider = MockEmbeddingProvider::new(256);
        let query = provider.embed("rust programming language").await.unwrap();
        let related = provider.embed("the rust language").await.unwrap();
        let unrelated = provider.embed("banana bread recipe").await.unwrap();

        let related_score = cosine_similarity(&query, &related).unwrap();
        let unrelated_score = cosine_similarity(&query, &unrelated).unwrap();
        assert!(related_score > unrelated_score);
    }

    #[test]
    fn test_text_without_tokens_is_zero_vector() {
        let provider = MockEmbeddingProvider::new(8);
        assert_eq!(provider.embed_sync("  ...  "), vec![0.0; 8]);
    }
}
