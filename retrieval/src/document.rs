//! Documents, metadata and the records returned by a collection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A scalar metadata value. Nested structures are not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON scalar; arrays, objects and null have no metadata form.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Metadata attached to a stored document.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Build a [`Metadata`] record from key/value pairs.
pub fn metadata<K, V, I>(pairs: I) -> Metadata
where
    K: Into<String>,
    V: Into<MetadataValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Metadata given to a document inserted without any: `{source: "document_{index}"}`.
pub fn default_metadata(index: usize) -> Metadata {
    metadata([("source", format!("document_{index}"))])
}

/// Generate a fresh document ID (`doc_` + 128 random bits in hex).
pub fn generate_id() -> String {
    format!("doc_{}", uuid::Uuid::new_v4().simple())
}

/// A document waiting to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    /// Caller-chosen ID; generated when absent.
    pub id: Option<String>,

    /// Raw text.
    pub text: String,

    /// Metadata; defaulted when absent.
    pub metadata: Option<Metadata>,
}

impl NewDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            metadata: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Outcome of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AddOutcome {
    /// The caller passed no texts.
    NothingToAdd,
    /// `added` documents were stored; the collection now holds `total`.
    Added { added: usize, total: usize },
}

impl AddOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::NothingToAdd => "No documents provided".to_string(),
            Self::Added { added, total } => format!(
                "Successfully added {added} documents. Total documents in collection: {total}"
            ),
        }
    }
}

/// Ranked query results as parallel sequences, best match first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub ids: Vec<String>,
    pub texts: Vec<String>,
    /// `1 - distance`, in `[-1, 1]`.
    pub similarities: Vec<f32>,
    /// Raw cosine distances from the index, in `[0, 2]`.
    pub distances: Vec<f32>,
    pub metadatas: Vec<Metadata>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Iterate over `(text, similarity, metadata)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32, &Metadata)> {
        self.texts
            .iter()
            .zip(&self.similarities)
            .zip(&self.metadatas)
            .map(|((text, similarity), metadata)| (text.as_str(), *similarity, metadata))
    }
}

/// Snapshot of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Collection name.
    pub name: String,

    /// Number of stored documents.
    pub count: usize,

    /// Similarity space of the index.
    pub space: String,

    /// Embedding model the collection encodes with.
    pub model: String,
}

impl std::fmt::Display for CollectionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Active collection: '{}'\nDocuments in collection: {}",
            self.name, self.count
        )
    }
}
