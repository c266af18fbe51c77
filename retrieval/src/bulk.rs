//! Batched bulk loading: chunk reports and the sample document format.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::{Metadata, NewDocument, metadata};
use crate::error::{Result, RetrievalError};

/// Value used for sample fields that are absent.
pub const UNKNOWN_FIELD: &str = "unknown";

/// `source` metadata of documents loaded from a sample file.
pub const SAMPLE_SOURCE: &str = "json_sample";

/// A chunk that could not be encoded or inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFailure {
    /// 1-based chunk number.
    pub chunk: usize,

    /// Offset of the chunk's first document in the load.
    pub start: usize,

    /// Documents in the chunk.
    pub size: usize,

    /// Rendered cause.
    pub error: String,
}

/// Overall outcome of a bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkStatus {
    /// Every document was stored.
    Complete,
    /// Some chunks failed.
    Partial,
    /// Nothing was stored despite a non-empty input.
    Failed,
    /// There was nothing to load.
    Empty,
}

/// Aggregate of a bulk load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkLoadReport {
    /// Documents submitted.
    pub attempted: usize,

    /// Documents stored.
    pub succeeded: usize,

    /// Documents left out because their ID was already stored.
    pub skipped: usize,

    /// Chunks that failed, in load order.
    pub failures: Vec<ChunkFailure>,

    /// Collection size when the load finished.
    pub total: usize,
}

impl BulkLoadReport {
    pub fn new(attempted: usize) -> Self {
        Self {
            attempted,
            ..Self::default()
        }
    }

    pub(crate) fn record_success(&mut self, size: usize) {
        self.succeeded += size;
    }

    pub(crate) fn record_failure(&mut self, failure: ChunkFailure) {
        self.failures.push(failure);
    }

    pub(crate) fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Turn a stored chunk into a failure, e.g. when the final write fails.
    pub(crate) fn revert_success(&mut self, failure: ChunkFailure) {
        self.succeeded = self.succeeded.saturating_sub(failure.size);
        self.failures.push(failure);
        self.failures.sort_by_key(|f| f.chunk);
    }

    pub fn status(&self) -> BulkStatus {
        if self.attempted == 0 {
            BulkStatus::Empty
        } else if self.succeeded + self.skipped == self.attempted {
            BulkStatus::Complete
        } else if self.succeeded > 0 {
            BulkStatus::Partial
        } else {
            BulkStatus::Failed
        }
    }

    /// Human-readable outcome line.
    pub fn summary(&self) -> String {
        match self.status() {
            BulkStatus::Empty => "No valid documents to add".to_string(),
            BulkStatus::Complete if self.skipped == 0 => format!(
                "All {} documents were processed and added successfully",
                self.attempted
            ),
            BulkStatus::Complete if self.succeeded == 0 => format!(
                "All {} documents are already in the collection",
                self.attempted
            ),
            BulkStatus::Complete => format!(
                "Added {} documents, {} were already in the collection",
                self.succeeded, self.skipped
            ),
            BulkStatus::Partial => format!(
                "Bulk load finished. {}/{} documents processed. Some batches may have failed, check the logs",
                self.succeeded, self.attempted
            ),
            BulkStatus::Failed => {
                "Error: could not add any document. Check the logs".to_string()
            }
        }
    }
}

/// On-disk sample file: `{"documents": [...]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SampleFile {
    #[serde(default)]
    pub documents: Vec<SampleEntry>,
}

/// One sample entry. Only `text` is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SampleEntry {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

impl SampleEntry {
    fn metadata(&self) -> Metadata {
        let field = |value: &Option<String>| value.clone().unwrap_or_else(|| UNKNOWN_FIELD.to_string());
        metadata([
            ("category", field(&self.category)),
            ("topic", field(&self.topic)),
            ("difficulty", field(&self.difficulty)),
            ("source", SAMPLE_SOURCE.to_string()),
        ])
    }
}

impl SampleFile {
    /// Read and parse a sample file.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RetrievalError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| RetrievalError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Documents ready for a bulk load. Entries without text are skipped;
    /// IDs keep the entry's position in the file.
    pub fn into_documents(self) -> Vec<NewDocument> {
        let mut documents = Vec::with_capacity(self.documents.len());
        for (i, entry) in self.documents.iter().enumerate() {
            let text = match entry.text.as_deref() {
                Some(text) if !text.trim().is_empty() => text,
                _ => {
                    warn!("Entry {i} has no 'text' field, skipping");
                    continue;
                }
            };
            documents.push(
                NewDocument::new(text)
                    .with_id(format!("json_doc_{i}"))
                    .with_metadata(entry.metadata()),
            );
        }
        info!(
            "Parsed {} of {} sample entries",
            documents.len(),
            self.documents.len()
        );
        documents
    }
}
