//! A named document collection backed by a vector store.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use semsearch_embeddings::EmbeddingManager;

use crate::bulk::{BulkLoadReport, ChunkFailure, SampleFile};
use crate::config::RetrievalConfig;
use crate::document::{
    AddOutcome, CollectionStats, Metadata, NewDocument, QueryResult, default_metadata, generate_id,
};
use crate::error::{Result, RetrievalError};
use crate::store::{FlatVectorStore, VectorRecord, VectorStore};

/// Documents plus their vectors, encoded with one embedding model.
///
/// Queries and stats take the store's read lock. Inserts, clears and bulk
/// loads take the write lock, so a bulk load is never interleaved with a
/// clear.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use semsearch_embeddings::{EmbeddingManager, ModelBinding};
/// use semsearch_retrieval::{Collection, FlatVectorStore};
///
/// # tokio_test::block_on(async {
/// let manager = EmbeddingManager::new(ModelBinding::mock(64)).unwrap();
/// let store = FlatVectorStore::in_memory("documents").unwrap();
/// let collection = Collection::new(Arc::new(manager), Box::new(store)).unwrap();
///
/// collection
///     .add(&["cats are mammals".to_string()], None)
///     .await
///     .unwrap();
/// let result = collection.query("cats are mammals", 3).await.unwrap();
/// assert_eq!(result.texts, vec!["cats are mammals"]);
/// # });
/// ```
pub struct Collection {
    /// Collection name.
    name: String,

    /// Encoder shared with callers.
    manager: Arc<EmbeddingManager>,

    /// Vector index.
    store: RwLock<Box<dyn VectorStore>>,
}

impl Collection {
    /// Bind `store` to `manager`. Fails when the store already holds vectors
    /// of a different size than the model produces, or vectors from another
    /// model.
    pub fn new(manager: Arc<EmbeddingManager>, mut store: Box<dyn VectorStore>) -> Result<Self> {
        if let (Some(stored), Some(model)) = (store.dimension(), manager.dimensions()) {
            if stored != model {
                return Err(RetrievalError::DimensionMismatch {
                    collection: store.name().to_string(),
                    expected: stored,
                    actual: model,
                });
            }
        }
        store.bind_model(&manager.binding().key())?;

        info!(
            "Collection {} ready (model {})",
            store.name(),
            manager.binding().model_name()
        );
        Ok(Self {
            name: store.name().to_string(),
            manager,
            store: RwLock::new(store),
        })
    }

    /// Build the manager and store described by `config`.
    pub async fn open(config: &RetrievalConfig) -> Result<Self> {
        let manager = Arc::new(config.embedding.build_manager()?);
        let store = match &config.persist_dir {
            Some(dir) => FlatVectorStore::open(dir, config.collection_name.as_str()).await?,
            None => FlatVectorStore::in_memory(config.collection_name.as_str())?,
        };
        let store = match manager.dimensions() {
            Some(dimension) => store.with_dimension(dimension)?,
            None => store,
        };
        Self::new(manager, Box::new(store))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manager(&self) -> &Arc<EmbeddingManager> {
        &self.manager
    }

    /// Insert `texts` under fresh IDs. Missing metadata is defaulted per
    /// document.
    pub async fn add(&self, texts: &[String], metadatas: Option<Vec<Metadata>>) -> Result<AddOutcome> {
        if let Some(metadatas) = &metadatas {
            if metadatas.len() != texts.len() {
                return Err(RetrievalError::InvalidInput(format!(
                    "{} metadata records for {} texts",
                    metadatas.len(),
                    texts.len()
                )));
            }
        }

        let documents = match metadatas {
            Some(metadatas) => texts
                .iter()
                .zip(metadatas)
                .map(|(text, meta)| NewDocument::new(text.as_str()).with_metadata(meta))
                .collect(),
            None => texts.iter().map(|text| NewDocument::new(text.as_str())).collect(),
        };
        self.add_documents(documents).await
    }

    /// Insert documents as one batch: one encode call, one store insert.
    pub async fn add_documents(&self, documents: Vec<NewDocument>) -> Result<AddOutcome> {
        if documents.is_empty() {
            return Ok(AddOutcome::NothingToAdd);
        }

        let added = documents.len();
        let records = self.encode_documents(documents, 0).await?;

        let mut store = self.store.write().await;
        store.add(records).await?;
        let total = store.count().await?;

        info!("Added {added} documents to {} (total {total})", self.name);
        Ok(AddOutcome::Added { added, total })
    }

    /// The `k` stored documents closest to `text`. Blank queries and empty
    /// collections give an empty result; `k` is clamped to `[1, count]`.
    pub async fn query(&self, text: &str, k: usize) -> Result<QueryResult> {
        if text.trim().is_empty() {
            return Ok(QueryResult::default());
        }

        let store = self.store.read().await;
        let count = store.count().await?;
        if count == 0 {
            debug!("Query on empty collection {}", self.name);
            return Ok(QueryResult::default());
        }
        let k = k.clamp(1, count);

        let embedding = self
            .manager
            .encode(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::InvalidInput("no vector for query".to_string()))?;

        let matches = store.query(&embedding, k).await?;
        debug!("Query returned {} of {count} documents", matches.len());

        Ok(QueryResult {
            similarities: matches.distances.iter().map(|d| 1.0 - d).collect(),
            ids: matches.ids,
            texts: matches.documents,
            distances: matches.distances,
            metadatas: matches.metadatas,
        })
    }

    /// Remove every document, keeping the name and similarity space.
    pub async fn clear(&self) -> Result<()> {
        self.store.write().await.delete_collection().await?;
        info!("Cleared collection {}", self.name);
        Ok(())
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.read().await.count().await
    }

    pub async fn stats(&self) -> Result<CollectionStats> {
        let store = self.store.read().await;
        Ok(CollectionStats {
            name: self.name.clone(),
            count: store.count().await?,
            space: store.space().to_string(),
            model: self.manager.binding().model_name().to_string(),
        })
    }

    /// Load `documents` in chunks of `chunk_size`. Documents whose ID is
    /// already stored are skipped. Each chunk is encoded and inserted as a
    /// unit; a failed chunk is recorded and the load moves on. The store is
    /// written once, after the last chunk.
    pub async fn bulk_load(&self, documents: Vec<NewDocument>, chunk_size: usize) -> BulkLoadReport {
        let chunk_size = chunk_size.max(1);
        let mut report = BulkLoadReport::new(documents.len());

        let mut store = self.store.write().await;

        let mut pending = Vec::with_capacity(documents.len());
        for document in documents {
            let stored = match document.id.as_deref() {
                Some(id) => store.contains(id).await.unwrap_or_else(|e| {
                    warn!("Could not look up {id} in {}: {e}", self.name);
                    false
                }),
                None => false,
            };
            if stored {
                report.record_skipped();
            } else {
                pending.push(document);
            }
        }
        if report.skipped > 0 {
            info!("Skipping {} documents already in {}", report.skipped, self.name);
        }

        let num_chunks = pending.len().div_ceil(chunk_size);
        info!(
            "Bulk loading {} documents into {} in {num_chunks} chunks of {chunk_size}",
            pending.len(),
            self.name
        );

        let mut staged = Vec::new();
        let mut remaining = pending.into_iter();
        for chunk in 1..=num_chunks {
            let start = (chunk - 1) * chunk_size;
            let batch: Vec<NewDocument> = remaining.by_ref().take(chunk_size).collect();
            let size = batch.len();
            debug!("Processing chunk {chunk}/{num_chunks} ({size} documents)");

            let inserted = match self.encode_documents(batch, start).await {
                Ok(records) => store.stage(records).await,
                Err(e) => Err(e),
            };

            match inserted {
                Ok(()) => {
                    report.record_success(size);
                    staged.push((chunk, start, size));
                    debug!("Chunk {chunk} staged");
                }
                Err(e) => {
                    error!("Error adding chunk {chunk} to {}: {e}", self.name);
                    report.record_failure(ChunkFailure {
                        chunk,
                        start,
                        size,
                        error: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = store.flush().await {
            error!("Error saving bulk load into {}: {e}", self.name);
            for (chunk, start, size) in staged {
                report.revert_success(ChunkFailure {
                    chunk,
                    start,
                    size,
                    error: e.to_string(),
                });
            }
        }

        report.total = match store.count().await {
            Ok(total) => total,
            Err(e) => {
                warn!("Could not count {} after bulk load: {e}", self.name);
                0
            }
        };
        info!("{}", report.summary());
        report
    }

    /// Parse a sample file and bulk load its documents.
    pub async fn load_sample_file(
        &self,
        path: impl AsRef<Path>,
        chunk_size: usize,
    ) -> Result<BulkLoadReport> {
        let path = path.as_ref();
        let documents = SampleFile::read(path).await?.into_documents();
        info!(
            "Loaded {} documents from {}, adding in chunks of {chunk_size}",
            documents.len(),
            path.display()
        );
        Ok(self.bulk_load(documents, chunk_size).await)
    }

    /// Validate, fill in IDs and metadata, and encode. `offset` is the
    /// position of the first document in the caller's input.
    async fn encode_documents(
        &self,
        documents: Vec<NewDocument>,
        offset: usize,
    ) -> Result<Vec<VectorRecord>> {
        if let Some(index) = documents.iter().position(|d| d.text.trim().is_empty()) {
            return Err(RetrievalError::EmptyDocument {
                index: offset + index,
            });
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = self.manager.encode(&texts).await?;

        Ok(documents
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (document, embedding))| VectorRecord {
                id: document.id.unwrap_or_else(generate_id),
                metadata: document
                    .metadata
                    .unwrap_or_else(|| default_metadata(offset + i)),
                text: document.text,
                embedding,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::metadata;
    use pretty_assertions::assert_eq;
    use semsearch_embeddings::{LocalModel, MockEmbeddingProvider, ModelBinding};

    fn collection() -> Collection {
        let manager = EmbeddingManager::new(ModelBinding::mock(64)).unwrap();
        let store = FlatVectorStore::in_memory("documents").unwrap();
        Collection::new(Arc::new(manager), Box::new(store)).unwrap()
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_add_nothing() {
        let collection = collection();
        assert_eq!(collection.add(&[], None).await.unwrap(), AddOutcome::NothingToAdd);
    }

    #[tokio::test]
    async fn test_add_defaults_metadata() {
        let collection = collection();
        let outcome = collection
            .add(&texts(&["first document", "second document"]), None)
            .await
            .unwrap();
        assert_eq!(outcome, AddOutcome::Added { added: 2, total: 2 });

        let result = collection.query("second document", 2).await.unwrap();
        assert_eq!(result.texts[0], "second document");
        assert_eq!(result.metadatas[0]["source"].as_str(), Some("document_1"));
        assert!(result.ids.iter().all(|id| id.starts_with("doc_")));
    }

    #[tokio::test]
    async fn test_add_rejects_metadata_count_mismatch() {
        let collection = collection();
        let err = collection
            .add(&texts(&["a text", "another"]), Some(vec![metadata([("k", "v")])]))
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidInput(_)));
        assert_eq!(collection.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_rejects_blank_text() {
        let collection = collection();
        let err = collection
            .add(&texts(&["fine", "   "]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::EmptyDocument { index: 1 }));
        assert_eq!(collection.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_blank_and_empty() {
        let collection = collection();
        assert!(collection.query("anything", 5).await.unwrap().is_empty());

        collection.add(&texts(&["stored text"]), None).await.unwrap();
        assert!(collection.query("   ", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_clamps_k() {
        let collection = collection();
        collection
            .add(&texts(&["one text", "two text", "three text"]), None)
            .await
            .unwrap();

        assert_eq!(collection.query("text", 10).await.unwrap().len(), 3);
        assert_eq!(collection.query("text", 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_similarity_is_one_minus_distance() {
        let collection = collection();
        collection
            .add(&texts(&["alpha beta", "gamma delta"]), None)
            .await
            .unwrap();

        let result = collection.query("alpha beta", 2).await.unwrap();
        for (similarity, distance) in result.similarities.iter().zip(&result.distances) {
            assert!((similarity - (1.0 - distance)).abs() < 1e-6);
        }
        assert!((result.similarities[0] - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_clear_and_stats() {
        let collection = collection();
        let stats = collection.stats().await.unwrap();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.space, "cosine");
        assert_eq!(stats.model, MockEmbeddingProvider::MODEL_NAME);

        collection.add(&texts(&["a document"]), None).await.unwrap();
        collection.clear().await.unwrap();

        let stats = collection.stats().await.unwrap();
        assert_eq!(stats.name, "documents");
        assert_eq!(stats.count, 0);
    }

    #[tokio::test]
    async fn test_bulk_load_isolates_failing_chunk() {
        let collection = collection();
        let documents = vec![
            NewDocument::new("first"),
            NewDocument::new("second"),
            NewDocument::new(" "),
            NewDocument::new("fourth"),
            NewDocument::new("fifth"),
        ];

        let report = collection.bulk_load(documents, 2).await;

        assert_eq!(report.attempted, 5);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.total, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].chunk, 2);
        assert_eq!(report.failures[0].start, 2);
        assert_eq!(report.failures[0].size, 2);
    }

    #[tokio::test]
    async fn test_rejects_store_with_other_dimension() {
        let mut store = FlatVectorStore::in_memory("documents").unwrap();
        store
            .add(vec![VectorRecord {
                id: "a".to_string(),
                text: "a".to_string(),
                metadata: Metadata::new(),
                embedding: vec![1.0, 0.0],
            }])
            .await
            .unwrap();

        let manager = EmbeddingManager::with_provider(
            ModelBinding::local(LocalModel::AllMiniLmL6V2),
            Arc::new(MockEmbeddingProvider::new(384)),
        );
        let err = Collection::new(Arc::new(manager), Box::new(store)).err();
        assert!(matches!(
            err,
            Some(RetrievalError::DimensionMismatch {
                expected: 2,
                actual: 384,
                ..
            })
        ));
    }
}
