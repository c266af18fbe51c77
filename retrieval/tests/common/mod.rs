//! Shared helpers for retrieval integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;

use semsearch_embeddings::similarity::normalize;
use semsearch_embeddings::{
    Embedding, EmbeddingManager, EmbeddingProvider, ModelBinding,
};
use semsearch_retrieval::{Collection, FlatVectorStore};

/// Words grouped by topic. Each topic is one axis of the vector space.
const TOPICS: [&[&str]; 4] = [
    &["cat", "cats", "dog", "dogs", "mammal", "mammals", "animal", "animals", "pet"],
    &["stock", "stocks", "market", "markets", "financial", "finance", "rose", "bank", "trading"],
    &["rust", "python", "programming", "compiler", "language", "code"],
    &["rain", "weather", "sunny", "forecast", "storm"],
];

/// Embeds a text by counting topic words, so texts about the same topic land
/// close together even without shared words.
pub struct TopicProvider;

impl TopicProvider {
    pub const DIMENSIONS: usize = TOPICS.len() + 1;

    fn embed_one(text: &str) -> Embedding {
        let mut embedding = vec![0.0; Self::DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            let axis = TOPICS
                .iter()
                .position(|topic| topic.contains(&word.as_str()))
                .unwrap_or(TOPICS.len());
            embedding[axis] += 1.0;
        }
        normalize(&mut embedding);
        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for TopicProvider {
    fn name(&self) -> &str {
        "topic"
    }

    fn model(&self) -> &str {
        "topic-lexicon"
    }

    fn dimension(&self) -> Option<usize> {
        Some(Self::DIMENSIONS)
    }

    async fn embed_batch(&self, texts: &[String]) -> semsearch_embeddings::Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| Self::embed_one(t)).collect())
    }
}

/// In-memory collection encoding with [`TopicProvider`].
pub fn topic_collection(name: &str) -> Collection {
    let manager = EmbeddingManager::with_provider(
        ModelBinding::remote("topic-lexicon"),
        Arc::new(TopicProvider),
    );
    let store = FlatVectorStore::in_memory(name).unwrap();
    Collection::new(Arc::new(manager), Box::new(store)).unwrap()
}

/// In-memory collection encoding with the token-hashing provider.
pub fn mock_collection(name: &str) -> Collection {
    let manager = EmbeddingManager::new(ModelBinding::mock(128)).unwrap();
    let store = FlatVectorStore::in_memory(name).unwrap();
    Collection::new(Arc::new(manager), Box::new(store)).unwrap()
}

pub fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
