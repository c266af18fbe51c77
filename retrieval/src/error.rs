//! Error types for the retrieval engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur in the retrieval engine.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] semsearch_embeddings::EmbeddingError),

    /// A vector does not match the collection's dimensionality.
    #[error("dimension mismatch in collection {collection}: expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    /// A collection holds vectors from a different embedding model.
    #[error("collection {collection} holds vectors from {stored}, cannot use {requested}")]
    ModelMismatch {
        collection: String,
        stored: String,
        requested: String,
    },

    /// A document ID is already stored or repeated within a batch.
    #[error("duplicate document id: {0}")]
    DuplicateId(String),

    /// A document with no text after trimming.
    #[error("document {index} has no text")]
    EmptyDocument { index: usize },

    /// Caller input that cannot be stored.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Persisted collection state could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// Bulk sample file does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Bulk sample file is not valid JSON.
    #[error("{} is not valid JSON: {source}", path.display())]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A file could not be turned into documents.
    #[error("ingest error: {0}")]
    Ingest(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
