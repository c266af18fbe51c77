//! Vector index storage.
//!
//! [`VectorStore`] is the seam between a collection and whatever index holds
//! its vectors. [`FlatVectorStore`] is an exact cosine index that keeps every
//! record in memory and, when opened on a directory, mirrors the collection to
//! `<dir>/<name>.json` after each write. Staged batches are written once, on
//! [`VectorStore::flush`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use semsearch_embeddings::Embedding;
use semsearch_embeddings::similarity::nearest_by_cosine;

use crate::document::Metadata;
use crate::error::{Result, RetrievalError};

/// Name of the only similarity space collections use.
pub const COSINE_SPACE: &str = "cosine";

/// A stored document with its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub embedding: Embedding,
}

/// Nearest neighbours of one query vector, closest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryMatches {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub distances: Vec<f32>,
    pub metadatas: Vec<Metadata>,
}

impl QueryMatches {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A named vector index in cosine space.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Collection name.
    fn name(&self) -> &str;

    /// Similarity space.
    fn space(&self) -> &str {
        COSINE_SPACE
    }

    /// Dimensionality of stored vectors, once known.
    fn dimension(&self) -> Option<usize>;

    /// Key of the embedding model the stored vectors came from, once bound.
    fn model(&self) -> Option<&str>;

    /// Bind the store to `model`. Fails with [`RetrievalError::ModelMismatch`]
    /// when the store holds vectors from another model.
    fn bind_model(&mut self, model: &str) -> Result<()>;

    /// Insert a batch. Either every record is stored or none is.
    async fn add(&mut self, records: Vec<VectorRecord>) -> Result<()>;

    /// Insert a batch without writing it through. Staged batches are
    /// queryable at once and become durable on [`VectorStore::flush`].
    async fn stage(&mut self, records: Vec<VectorRecord>) -> Result<()> {
        self.add(records).await
    }

    /// Write every staged batch. On failure the staged batches are dropped.
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Whether a record with `id` is stored.
    async fn contains(&self, id: &str) -> Result<bool>;

    /// The `k` records closest to `embedding`, by increasing cosine distance.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<QueryMatches>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;

    /// Drop every record and recreate the collection empty, keeping its name
    /// and space.
    async fn delete_collection(&mut self) -> Result<()>;
}

/// On-disk layout of a persisted collection.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedCollection {
    name: String,
    space: String,
    dimension: Option<usize>,
    #[serde(default)]
    model: Option<String>,
    records: Vec<VectorRecord>,
}

/// Batches inserted since the last write.
#[derive(Debug)]
struct Staged {
    ids: Vec<String>,

    /// Dimensionality before the first staged batch.
    dimension: Option<usize>,
}

/// Exact cosine index held in memory, optionally persisted as JSON.
pub struct FlatVectorStore {
    /// Collection name.
    name: String,

    /// Dimensionality fixed at construction, if any.
    configured_dimension: Option<usize>,

    /// Current dimensionality; learned from the first insert when not configured.
    dimension: Option<usize>,

    /// Model key the vectors were encoded with.
    model: Option<String>,

    /// Records in insertion order.
    records: IndexMap<String, VectorRecord>,

    /// Inserts not yet written to the backing file.
    staged: Option<Staged>,

    /// Backing file.
    path: Option<PathBuf>,
}

impl FlatVectorStore {
    /// Create an empty, memory-only store.
    pub fn in_memory(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            configured_dimension: None,
            dimension: None,
            model: None,
            records: IndexMap::new(),
            staged: None,
            path: None,
        })
    }

    /// Open (or create) the collection `name` persisted under `dir`.
    pub async fn open(dir: impl AsRef<Path>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;

        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .await
            .map_err(|e| RetrievalError::Storage(format!("{}: {e}", dir.display())))?;

        let path = dir.join(format!("{name}.json"));
        let mut store = Self {
            name,
            configured_dimension: None,
            dimension: None,
            model: None,
            records: IndexMap::new(),
            staged: None,
            path: Some(path.clone()),
        };

        if fs::try_exists(&path).await? {
            store.load(&path).await?;
        } else {
            store.persist().await?;
            info!("Created collection {} at {}", store.name, path.display());
        }

        Ok(store)
    }

    /// Fix the dimensionality every vector must have.
    pub fn with_dimension(mut self, dimension: usize) -> Result<Self> {
        if let Some(existing) = self.dimension {
            if existing != dimension {
                return Err(RetrievalError::DimensionMismatch {
                    collection: self.name.clone(),
                    expected: existing,
                    actual: dimension,
                });
            }
        }
        self.configured_dimension = Some(dimension);
        self.dimension = Some(dimension);
        Ok(self)
    }

    /// Path of the backing file, if persisted.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get a record by ID.
    pub fn get(&self, id: &str) -> Option<&VectorRecord> {
        self.records.get(id)
    }

    async fn load(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| RetrievalError::Storage(format!("{}: {e}", path.display())))?;
        let persisted: PersistedCollection = serde_json::from_str(&content)?;

        if persisted.name != self.name {
            return Err(RetrievalError::Storage(format!(
                "{} holds collection {}, expected {}",
                path.display(),
                persisted.name,
                self.name
            )));
        }
        if persisted.space != COSINE_SPACE {
            return Err(RetrievalError::Storage(format!(
                "collection {} uses unsupported space {}",
                self.name, persisted.space
            )));
        }

        let mut records = IndexMap::with_capacity(persisted.records.len());
        for record in persisted.records {
            if let Some(expected) = persisted.dimension {
                check_dimension(&self.name, expected, record.embedding.len())?;
            }
            records.insert(record.id.clone(), record);
        }

        self.dimension = persisted.dimension;
        self.model = persisted.model;
        self.records = records;
        info!(
            "Loaded {} documents into collection {}",
            self.records.len(),
            self.name
        );
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let persisted = PersistedCollection {
            name: self.name.clone(),
            space: COSINE_SPACE.to_string(),
            dimension: self.dimension,
            model: self.model.clone(),
            records: self.records.values().cloned().collect(),
        };
        let content = serde_json::to_string(&persisted)?;

        // Write atomically using a temp file
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| RetrievalError::Storage(format!("{}: {e}", temp_path.display())))?;
        fs::rename(&temp_path, path)
            .await
            .map_err(|e| RetrievalError::Storage(format!("{}: {e}", path.display())))?;

        debug!("Saved collection {} ({} records)", self.name, self.records.len());
        Ok(())
    }

    /// Reject the whole batch before anything is written.
    fn validate_batch(&self, records: &[VectorRecord]) -> Result<Option<usize>> {
        let mut dimension = self.dimension;
        let mut seen = std::collections::HashSet::with_capacity(records.len());

        for record in records {
            if self.records.contains_key(&record.id) || !seen.insert(record.id.as_str()) {
                return Err(RetrievalError::DuplicateId(record.id.clone()));
            }
            match dimension {
                Some(expected) => check_dimension(&self.name, expected, record.embedding.len())?,
                None => dimension = Some(record.embedding.len()),
            }
        }

        Ok(dimension)
    }

    /// Validate and insert in memory. Returns the inserted IDs.
    fn insert_batch(&mut self, records: Vec<VectorRecord>) -> Result<Vec<String>> {
        self.dimension = self.validate_batch(&records)?;
        let ids = records.iter().map(|r| r.id.clone()).collect();
        for record in records {
            self.records.insert(record.id.clone(), record);
        }
        Ok(ids)
    }

    fn remove_batch(&mut self, ids: &[String], dimension: Option<usize>) {
        for id in ids {
            self.records.shift_remove(id);
        }
        self.dimension = dimension;
    }
}

#[async_trait]
impl VectorStore for FlatVectorStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn bind_model(&mut self, model: &str) -> Result<()> {
        if let Some(stored) = &self.model {
            if stored != model && !self.records.is_empty() {
                return Err(RetrievalError::ModelMismatch {
                    collection: self.name.clone(),
                    stored: stored.clone(),
                    requested: model.to_string(),
                });
            }
        }
        self.model = Some(model.to_string());
        Ok(())
    }

    async fn add(&mut self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let previous_dimension = self.dimension;
        let ids = self.insert_batch(records)?;

        if let Err(e) = self.persist().await {
            self.remove_batch(&ids, previous_dimension);
            return Err(e);
        }
        // Anything staged went out with this write
        self.staged = None;

        debug!("Added {} records to collection {}", ids.len(), self.name);
        Ok(())
    }

    async fn stage(&mut self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let previous_dimension = self.dimension;
        let ids = self.insert_batch(records)?;
        self.staged
            .get_or_insert_with(|| Staged {
                ids: Vec::new(),
                dimension: previous_dimension,
            })
            .ids
            .extend(ids);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        let Some(staged) = self.staged.take() else {
            return Ok(());
        };

        if let Err(e) = self.persist().await {
            self.remove_batch(&staged.ids, staged.dimension);
            return Err(e);
        }

        debug!(
            "Flushed {} staged records to collection {}",
            staged.ids.len(),
            self.name
        );
        Ok(())
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.records.contains_key(id))
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<QueryMatches> {
        if self.records.is_empty() || k == 0 {
            return Ok(QueryMatches::default());
        }
        if let Some(expected) = self.dimension {
            check_dimension(&self.name, expected, embedding.len())?;
        }

        let nearest = nearest_by_cosine(
            embedding,
            self.records.values().map(|r| r.embedding.as_slice()),
            k,
        )?;

        let mut matches = QueryMatches::default();
        for (position, distance) in nearest {
            if let Some((_, record)) = self.records.get_index(position) {
                matches.ids.push(record.id.clone());
                matches.documents.push(record.text.clone());
                matches.distances.push(distance);
                matches.metadatas.push(record.metadata.clone());
            }
        }
        Ok(matches)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.len())
    }

    async fn delete_collection(&mut self) -> Result<()> {
        let records = std::mem::take(&mut self.records);
        let dimension = std::mem::replace(&mut self.dimension, self.configured_dimension);

        if let Err(e) = self.persist().await {
            self.records = records;
            self.dimension = dimension;
            return Err(e);
        }
        self.staged = None;

        info!("Deleted {} documents from collection {}", records.len(), self.name);
        Ok(())
    }
}

fn check_dimension(collection: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(RetrievalError::DimensionMismatch {
            collection: collection.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Collection names double as file names.
fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(RetrievalError::Config(format!(
            "invalid collection name {name:?}: use ASCII letters, digits, '-' or '_'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::metadata;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(id: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            text: format!("text of {id}"),
            metadata: metadata([("source", id)]),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let mut store = FlatVectorStore::in_memory("docs").unwrap();
        store
            .add(vec![
                record("a", vec![1.0, 0.0, 0.0]),
                record("b", vec![0.0, 1.0, 0.0]),
                record("c", vec![0.7, 0.7, 0.0]),
            ])
            .await
            .unwrap();

        let matches = store.query(&[1.0, 0.0, 0.0], 2).await.unwrap();

        assert_eq!(matches.ids, vec!["a", "c"]);
        assert_eq!(matches.documents[0], "text of a");
        assert!(matches.distances[0].abs() < 1e-6);
        assert!(matches.distances[0] <= matches.distances[1]);
    }

    #[tokio::test]
    async fn test_batch_with_duplicate_id_is_rejected_atomically() {
        let mut store = FlatVectorStore::in_memory("docs").unwrap();
        store.add(vec![record("a", vec![1.0, 0.0])]).await.unwrap();

        let err = store
            .add(vec![record("b", vec![0.0, 1.0]), record("a", vec![1.0, 1.0])])
            .await
            .unwrap_err();

        assert!(matches!(err, RetrievalError::DuplicateId(ref id) if id == "a"));
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get("b").is_none());
    }

    #[tokio::test]
    async fn test_batch_with_wrong_dimension_is_rejected_atomically() {
        let mut store = FlatVectorStore::in_memory("docs").unwrap().with_dimension(2).unwrap();

        let err = store
            .add(vec![record("a", vec![1.0, 0.0]), record("b", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch {
                expected: 2,
                actual: 3,
                ..
            }
        ));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dimension_learned_from_first_insert() {
        let mut store = FlatVectorStore::in_memory("docs").unwrap();
        assert_eq!(store.dimension(), None);
        store.add(vec![record("a", vec![1.0, 0.0, 0.0])]).await.unwrap();
        assert_eq!(store.dimension(), Some(3));

        store.delete_collection().await.unwrap();
        assert_eq!(store.dimension(), None);
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.name(), "docs");
    }

    #[tokio::test]
    async fn test_query_empty_store() {
        let store = FlatVectorStore::in_memory("docs").unwrap();
        let matches = store.query(&[1.0, 0.0], 5).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut store = FlatVectorStore::open(temp_dir.path(), "documents").await.unwrap();
            store
                .add(vec![record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0])])
                .await
                .unwrap();
        }

        let store = FlatVectorStore::open(temp_dir.path(), "documents").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.dimension(), Some(2));
        assert_eq!(store.get("b").unwrap().metadata["source"].as_str(), Some("b"));

        let matches = store.query(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(matches.ids, vec!["b"]);
    }

    #[tokio::test]
    async fn test_delete_collection_persists_empty_state() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut store = FlatVectorStore::open(temp_dir.path(), "documents").await.unwrap();
            store.add(vec![record("a", vec![1.0, 0.0])]).await.unwrap();
            store.delete_collection().await.unwrap();
        }

        let store = FlatVectorStore::open(temp_dir.path(), "documents").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_rejects_dimension_change() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut store = FlatVectorStore::open(temp_dir.path(), "documents").await.unwrap();
            store.add(vec![record("a", vec![1.0, 0.0])]).await.unwrap();
        }

        let store = FlatVectorStore::open(temp_dir.path(), "documents").await.unwrap();
        assert!(store.with_dimension(384).is_err());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_records() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("collections");
        let mut store = FlatVectorStore::open(&dir, "documents").await.unwrap();
        store.add(vec![record("a", vec![1.0, 0.0])]).await.unwrap();

        std::fs::remove_dir_all(&dir).unwrap();
        assert!(store.delete_collection().await.is_err());

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.dimension(), Some(2));
        assert!(store.get("a").is_some());
    }

    #[tokio::test]
    async fn test_staged_batches_written_on_flush() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FlatVectorStore::open(temp_dir.path(), "documents").await.unwrap();

        store.stage(vec![record("a", vec![1.0, 0.0])]).await.unwrap();
        store.stage(vec![record("b", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
        assert!(store.contains("b").await.unwrap());

        let on_disk = FlatVectorStore::open(temp_dir.path(), "documents").await.unwrap();
        assert_eq!(on_disk.count().await.unwrap(), 0);

        store.flush().await.unwrap();
        let on_disk = FlatVectorStore::open(temp_dir.path(), "documents").await.unwrap();
        assert_eq!(on_disk.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failed_flush_drops_staged_batches() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("collections");
        let mut store = FlatVectorStore::open(&dir, "documents").await.unwrap();
        store.add(vec![record("a", vec![1.0, 0.0])]).await.unwrap();
        store.stage(vec![record("b", vec![0.0, 1.0])]).await.unwrap();

        std::fs::remove_dir_all(&dir).unwrap();
        assert!(store.flush().await.is_err());

        assert_eq!(store.count().await.unwrap(), 1);
        assert!(!store.contains("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_model_binding_persists() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut store = FlatVectorStore::open(temp_dir.path(), "documents").await.unwrap();
            store.bind_model("local/all-MiniLM-L6-v2").unwrap();
            store.add(vec![record("a", vec![1.0, 0.0])]).await.unwrap();
        }

        let mut store = FlatVectorStore::open(temp_dir.path(), "documents").await.unwrap();
        assert_eq!(store.model(), Some("local/all-MiniLM-L6-v2"));
        assert!(store.bind_model("local/all-MiniLM-L6-v2").is_ok());

        let err = store
            .bind_model("local/paraphrase-multilingual-MiniLM-L12-v2")
            .unwrap_err();
        assert!(matches!(err, RetrievalError::ModelMismatch { .. }));

        // An empty collection can move to another model
        store.delete_collection().await.unwrap();
        assert!(store.bind_model("mock/mock-token-hash").is_ok());
        assert_eq!(store.model(), Some("mock/mock-token-hash"));
    }

    #[test]
    fn test_invalid_names() {
        assert!(FlatVectorStore::in_memory("").is_err());
        assert!(FlatVectorStore::in_memory("../escape").is_err());
        assert!(FlatVectorStore::in_memory("my_docs-2").is_ok());
    }
}
