//! # Embeddings
//!
//! This crate turns text into dense vectors and compares them for the
//! semsearch retrieval engine.
//!
//! ## Features
//!
//! - **Embedding Manager**: one `encode` contract over every provider
//! - **Providers**: local ONNX models (feature `local`), OpenAI-compatible APIs,
//!   and a deterministic token-hashing provider
//! - **Model Catalog**: dimensionality and footprint of the supported models
//! - **Similarity**: cosine similarity, batch scoring and nearest-neighbour ranking
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ModelBinding ──► EmbeddingManager ──► Vec<Embedding>           │
//! │                        │        │                               │
//! │                        ▼        ▼                               │
//! │        Local/OpenAI/Mock     similarity                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod error;
#[cfg(feature = "local")]
pub mod local;
pub mod manager;
pub mod mock;
pub mod provider;
pub mod similarity;

pub use catalog::{CatalogEntry, LocalModel, ModelInfo, ProviderKind};
pub use error::{EmbeddingError, Result};
#[cfg(feature = "local")]
pub use local::LocalProvider;
pub use manager::{EmbeddingManager, ModelBinding};
pub use mock::MockEmbeddingProvider;
pub use provider::{EmbeddingProvider, OpenAIProvider};
pub use similarity::{batch_similarity, cosine_similarity};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
