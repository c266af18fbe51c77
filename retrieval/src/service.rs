//! Message-returning facade over a [`Collection`].
//!
//! Every method reports failures as text and logs them; none returns an
//! error for expected input.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::collection::Collection;
use crate::config::RetrievalConfig;
use crate::document::{AddOutcome, Metadata, MetadataValue};
use crate::error::RetrievalError;
use crate::ingest::DocumentProcessor;

/// Metadata values shown when a search hit lacks them.
const MISSING_FIELD: &str = "N/A";

/// Search hits as parallel sequences, best match first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub texts: Vec<String>,
    pub distances: Vec<f32>,
    pub metadatas: Vec<Metadata>,
}

impl SearchResponse {
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Caller-facing operations on one collection.
#[derive(Clone)]
pub struct SearchService {
    collection: Arc<Collection>,
    config: Arc<RetrievalConfig>,
}

impl SearchService {
    pub fn new(collection: Arc<Collection>, config: RetrievalConfig) -> Self {
        Self {
            collection,
            config: Arc::new(config),
        }
    }

    /// Open the collection `config` describes.
    pub async fn open(config: RetrievalConfig) -> crate::Result<Self> {
        let collection = Collection::open(&config).await?;
        Ok(Self::new(Arc::new(collection), config))
    }

    pub fn collection(&self) -> &Arc<Collection> {
        &self.collection
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub async fn add_documents(&self, texts: &[String], metadatas: Option<Vec<Metadata>>) -> String {
        match self.collection.add(texts, metadatas).await {
            Ok(outcome) => outcome.message(),
            Err(e) => {
                error!("Error adding documents: {e}");
                format!("Error adding documents: {e}")
            }
        }
    }

    /// Nearest documents to `query`; empty on blank queries and on failure.
    pub async fn search_documents(&self, query: &str, k: usize) -> SearchResponse {
        match self.collection.query(query, k).await {
            Ok(result) => SearchResponse {
                texts: result.texts,
                distances: result.distances,
                metadatas: result.metadatas,
            },
            Err(e) => {
                error!("Error searching documents: {e}");
                SearchResponse::default()
            }
        }
    }

    pub async fn clear_collection(&self) -> String {
        match self.collection.clear().await {
            Ok(()) => "Collection cleared successfully".to_string(),
            Err(e) => {
                error!("Error clearing collection: {e}");
                format!("Error clearing collection: {e}")
            }
        }
    }

    pub async fn get_collection_stats(&self) -> String {
        match self.collection.stats().await {
            Ok(stats) => stats.to_string(),
            Err(e) => {
                error!("Error getting statistics for {}: {e}", self.collection.name());
                format!("Error getting statistics: {e}")
            }
        }
    }

    /// Bulk load the configured sample file. Returns the outcome message and
    /// the collection stats.
    pub async fn add_sample_data(&self) -> (String, String) {
        info!("Request to add sample data");
        let path = &self.config.bulk.sample_path;

        let message = match self
            .collection
            .load_sample_file(path, self.config.bulk.chunk_size)
            .await
        {
            Ok(report) => report.summary(),
            Err(RetrievalError::FileNotFound(path)) => {
                error!("Sample file {} not found", path.display());
                format!("Error: file {} not found", path.display())
            }
            Err(RetrievalError::InvalidJson { path, .. }) => {
                error!("Sample file {} is not valid JSON", path.display());
                format!("Error: file {} is not valid JSON", path.display())
            }
            Err(e) => {
                error!("Unexpected error processing {}: {e}", path.display());
                format!("Unexpected error processing {}: {e}", path.display())
            }
        };

        (message, self.get_collection_stats().await)
    }

    /// Add one document with `category` and `topic` metadata, defaulting to
    /// `custom` and `general`.
    pub async fn add_custom_document(&self, text: &str, category: &str, topic: &str) -> (String, String) {
        if text.trim().is_empty() {
            return (
                "Please enter the document text".to_string(),
                self.get_collection_stats().await,
            );
        }

        let category = non_blank_or(category, "custom");
        let topic = non_blank_or(topic, "general");
        let metadata = crate::document::metadata([("category", category), ("topic", topic)]);

        let message = self
            .add_documents(&[text.to_string()], Some(vec![metadata]))
            .await;
        (message, self.get_collection_stats().await)
    }

    /// Run a query and render the hits. Returns the rendered results and the
    /// collection stats.
    pub async fn search(&self, query: &str, k: usize) -> (String, String) {
        if query.trim().is_empty() {
            return ("Please enter a search query".to_string(), String::new());
        }

        let response = self.search_documents(query, k).await;
        if response.is_empty() {
            return ("No results found".to_string(), String::new());
        }

        (
            render_results(query, &response),
            self.get_collection_stats().await,
        )
    }

    /// Read a file or directory and add what it contains.
    pub async fn ingest_path(&self, path: impl Into<PathBuf>) -> String {
        let path = path.into();
        let processor = DocumentProcessor::new(self.config.ingest.clone());

        let shown = path.display().to_string();
        let documents =
            match tokio::task::spawn_blocking(move || processor.process_path(&path)).await {
                Ok(Ok(documents)) => documents,
                Ok(Err(e)) => {
                    error!("Error reading {shown}: {e}");
                    return format!("Error reading {shown}: {e}");
                }
                Err(e) => {
                    error!("Ingest task failed: {e}");
                    return format!("Error reading {shown}: {e}");
                }
            };

        if documents.is_empty() {
            return format!("No documents found in {shown}");
        }

        match self.collection.add_documents(documents).await {
            Ok(AddOutcome::NothingToAdd) => format!("No documents found in {shown}"),
            Ok(outcome) => outcome.message(),
            Err(e) => {
                error!("Error adding documents from {shown}: {e}");
                format!("Error adding documents: {e}")
            }
        }
    }
}

fn non_blank_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() { default } else { value }
}

fn field<'a>(metadata: &'a Metadata, key: &str) -> std::borrow::Cow<'a, str> {
    match metadata.get(key) {
        Some(MetadataValue::String(s)) => std::borrow::Cow::Borrowed(s.as_str()),
        Some(other) => std::borrow::Cow::Owned(other.to_string()),
        None => std::borrow::Cow::Borrowed(MISSING_FIELD),
    }
}

fn render_results(query: &str, response: &SearchResponse) -> String {
    let mut out = format!(
        "Found {} results for: '{query}'\n\n",
        response.texts.len()
    );

    for (i, ((text, distance), metadata)) in response
        .texts
        .iter()
        .zip(&response.distances)
        .zip(&response.metadatas)
        .enumerate()
    {
        let similarity = 1.0 - distance;
        let _ = writeln!(out, "**Result {}** (Similarity: {similarity:.3})", i + 1);
        let _ = writeln!(
            out,
            "Category: {} | Topic: {}",
            field(metadata, "category"),
            field(metadata, "topic")
        );
        let _ = writeln!(out, "{text}\n");
    }

    out
}
