//! # Retrieval Engine
//!
//! This crate stores documents with their embeddings and answers nearest
//! neighbour queries over them:
//!
//! - **Collection**: insert, top-k query, clear and stats over one vector store
//! - **Vector Store**: exact cosine index with optional JSON persistence
//! - **Bulk Loading**: chunked inserts where a failed chunk does not stop the load
//! - **Ingestion**: `.txt` and `.json` files turned into chunked documents
//! - **Search Service**: message-returning operations for CLIs and UIs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Retrieval Engine                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  Document    │  │  Sample File │  │ Search       │           │
//! │  │  Processor   │  │  (bulk)      │  │ Service      │           │
//! │  └──────────────┘  └──────────────┘  └──────────────┘           │
//! │         │                │                  │                   │
//! │         └────────────────┼──────────────────┘                   │
//! │                          ▼                                      │
//! │                  ┌──────────────┐      ┌──────────────┐         │
//! │                  │  Collection  │ ───► │  Embedding   │         │
//! │                  │              │      │  Manager     │         │
//! │                  └──────────────┘      └──────────────┘         │
//! │                          │                                      │
//! │                          ▼                                      │
//! │                  ┌──────────────┐                               │
//! │                  │ Vector Store │                               │
//! │                  └──────────────┘                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use semsearch_retrieval::{RetrievalConfig, SearchService};
//!
//! let service = SearchService::open(RetrievalConfig::default()).await?;
//! service.add_documents(&["Rust has no garbage collector".to_string()], None).await;
//!
//! let (results, stats) = service.search("memory management", 5).await;
//! ```

pub mod bulk;
pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod ingest;
pub mod service;
pub mod store;

pub use bulk::{BulkLoadReport, BulkStatus, ChunkFailure, SampleFile};
pub use collection::Collection;
pub use config::{EmbeddingConfig, EmbeddingProviderType, RetrievalConfig};
pub use document::{
    AddOutcome, CollectionStats, Metadata, MetadataValue, NewDocument, QueryResult, metadata,
};
pub use error::{Result, RetrievalError};
pub use ingest::{DocumentProcessor, chunk_text, preprocess_text};
pub use service::{SearchResponse, SearchService};
pub use store::{FlatVectorStore, QueryMatches, VectorRecord, VectorStore};

// Re-export from dependencies for convenience
pub use semsearch_embeddings::{EmbeddingManager, EmbeddingProvider, ModelBinding};
