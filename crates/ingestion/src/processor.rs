//! Ingestion processor
//!
//! Core logic for indexing documents: chunking, embedding, vector store
//! upsert and bookkeeping of the vector ids on the document row.

use crate::chunker::{chunk_text, ChunkingConfig, TextChunk};
use crate::errors::IngestionError;
use crate::extract::ExtractedDocument;
use docchat_common::db::models::{Collection, Document};
use docchat_common::db::Repository;
use docchat_common::embeddings::Embedder;
use docchat_common::vectordb::{chunk_vector_id, ChunkMetadata, VectorRecord, VectorStore};
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Ingestion processor
#[derive(Clone)]
pub struct IngestionProcessor {
    repository: Repository,
    chunking_config: ChunkingConfig,
}

impl IngestionProcessor {
    pub fn new(repository: Repository, chunking_config: ChunkingConfig) -> Self {
        Self {
            repository,
            chunking_config,
        }
    }

    /// Store a document and index its chunks.
    ///
    /// When embedding or the vector store fails the document row and any
    /// vectors already written are removed again, so no half-indexed
    /// document is left behind.
    #[instrument(skip_all, fields(collection_id = %collection.id, name = %document.name))]
    pub async fn ingest(
        &self,
        collection: &Collection,
        document: ExtractedDocument,
        embedder: &dyn Embedder,
        store: &dyn VectorStore,
    ) -> Result<Document, IngestionError> {
        let start = Instant::now();
        let chunks = chunk_text(&document.content, document.doc_type, &self.chunking_config)?;
        info!(chunk_count = chunks.len(), "Text chunked successfully");

        let doc_type = document.doc_type;
        let source = document.name.clone();
        let row = self
            .repository
            .create_document(collection.id, document.name, document.content, doc_type)
            .await?;

        let records = match self.embed_chunks(&row, &source, chunks, embedder).await {
            Ok(records) => records,
            Err(e) => {
                self.discard(collection, &row, &[], store).await;
                return Err(e);
            }
        };

        let vector_ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let chunk_count = vector_ids.len();

        let stored = match store
            .upsert(&collection.vector_collection_name(), records)
            .await
        {
            Ok(()) => {
                self.repository
                    .set_document_vector_ids(row.id, vector_ids.clone())
                    .await
            }
            Err(e) => Err(e),
        };

        let row = match stored {
            Ok(row) => row,
            Err(e) => {
                self.discard(collection, &row, &vector_ids, store).await;
                return Err(e.into());
            }
        };

        docchat_common::metrics::record_ingestion(
            start.elapsed().as_secs_f64(),
            chunk_count,
            doc_type.as_str(),
        );
        info!(document_id = %row.id, chunk_count, "Document indexed");

        Ok(row)
    }

    /// Embed every chunk, one vector record per chunk
    async fn embed_chunks(
        &self,
        row: &Document,
        source: &str,
        chunks: Vec<TextChunk>,
        embedder: &dyn Embedder,
    ) -> Result<Vec<VectorRecord>, IngestionError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(IngestionError::EmbeddingCountMismatch {
                expected: chunks.len(),
                actual: embeddings.len(),
            });
        }

        let document_id = row.id.to_string();
        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorRecord {
                id: chunk_vector_id(&document_id, chunk.index),
                embedding,
                text: chunk.content,
                metadata: ChunkMetadata {
                    document_id: document_id.clone(),
                    chunk_index: chunk.index,
                    source: source.to_string(),
                },
            })
            .collect())
    }

    /// Best-effort removal of a document that failed to index
    async fn discard(
        &self,
        collection: &Collection,
        row: &Document,
        vector_ids: &[String],
        store: &dyn VectorStore,
    ) {
        if !vector_ids.is_empty() {
            if let Err(e) = store
                .delete(&collection.vector_collection_name(), vector_ids)
                .await
            {
                warn!(document_id = %row.id, error = %e, "Failed to remove vectors of unindexed document");
            }
        }

        if let Err(e) = self.repository.delete_document(row.id).await {
            warn!(document_id = %row.id, error = %e, "Failed to remove unindexed document");
        }
    }

    /// Delete a document's vectors (best effort) and then its row
    #[instrument(skip_all, fields(collection_id = %collection.id, document_id = %document.id))]
    pub async fn remove(
        &self,
        collection: &Collection,
        document: &Document,
        store: &dyn VectorStore,
    ) -> Result<(), IngestionError> {
        if let Err(e) = store
            .delete(&collection.vector_collection_name(), &document.vector_ids.0)
            .await
        {
            warn!(error = %e, "Failed to delete document vectors, continuing");
        }

        self.repository.delete_document(document.id).await?;
        info!("Document deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract, UploadSource};
    use async_trait::async_trait;
    use docchat_common::db::DbPool;
    use docchat_common::embeddings::MockEmbedder;
    use docchat_common::errors::{AppError, Result as AppResult};
    use docchat_common::vectordb::{MemoryVectorStore, ScoredChunk};

    struct FailingStore;

    #[async_trait]
    impl VectorStore for FailingStore {
        fn name(&self) -> &str {
            "failing"
        }
        async fn create_collection(&self, _: &str) -> AppResult<()> {
            Ok(())
        }
        async fn delete_collection(&self, _: &str) -> AppResult<()> {
            Ok(())
        }
        async fn upsert(&self, _: &str, _: Vec<VectorRecord>) -> AppResult<()> {
            Err(AppError::VectorStore {
                message: "unavailable".into(),
            })
        }
        async fn query(&self, _: &str, _: &[f32], _: usize) -> AppResult<Vec<ScoredChunk>> {
            Ok(Vec::new())
        }
        async fn delete(&self, _: &str, _: &[String]) -> AppResult<()> {
            Err(AppError::VectorStore {
                message: "unavailable".into(),
            })
        }
    }

    /// Returns a single vector whatever the batch size
    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed(&self, _: &str) -> AppResult<Vec<f32>> {
            Ok(vec![1.0; 8])
        }
        async fn embed_batch(&self, _: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0; 8]])
        }
        fn model_name(&self) -> &str {
            "short"
        }
        fn dimension(&self) -> usize {
            8
        }
    }

    /// Writes the first record to the inner store, then fails
    struct PartialStore(MemoryVectorStore);

    #[async_trait]
    impl VectorStore for PartialStore {
        fn name(&self) -> &str {
            "partial"
        }
        async fn create_collection(&self, collection: &str) -> AppResult<()> {
            self.0.create_collection(collection).await
        }
        async fn delete_collection(&self, collection: &str) -> AppResult<()> {
            self.0.delete_collection(collection).await
        }
        async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> AppResult<()> {
            self.0
                .upsert(collection, records.into_iter().take(1).collect())
                .await?;
            Err(AppError::VectorStore {
                message: "connection reset".into(),
            })
        }
        async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> AppResult<Vec<ScoredChunk>> {
            self.0.query(collection, embedding, k).await
        }
        async fn delete(&self, collection: &str, ids: &[String]) -> AppResult<()> {
            self.0.delete(collection, ids).await
        }
    }

    async fn setup() -> (IngestionProcessor, Repository, Collection) {
        let repo = Repository::new(DbPool::in_memory().await.unwrap());
        let user = repo
            .create_user("a@b.co".into(), "hash".into(), None)
            .await
            .unwrap();
        let collection = repo
            .create_collection(user.id, "Docs".into(), None)
            .await
            .unwrap();
        let processor = IngestionProcessor::new(repo.clone(), ChunkingConfig::default());
        (processor, repo, collection)
    }

    fn long_text() -> ExtractedDocument {
        extract(UploadSource::Text {
            name: Some("guide".into()),
            text: "Ownership rules keep memory safe. ".repeat(40),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_ingest_stores_matching_vector_ids() {
        let (processor, _repo, collection) = setup().await;
        let store = MemoryVectorStore::new();
        let embedder = MockEmbedder::new(32);

        let doc = processor
            .ingest(&collection, long_text(), &embedder, &store)
            .await
            .unwrap();

        let ids = &doc.vector_ids.0;
        assert!(ids.len() > 1);
        assert_eq!(ids[0], format!("{}_chunk_0", doc.id));
        assert_eq!(
            store.len(&collection.vector_collection_name()).await,
            Some(ids.len())
        );

        let hits = store
            .query(&collection.vector_collection_name(), &embedder.embed("ownership").await.unwrap(), 1)
            .await
            .unwrap();
        assert_eq!(hits[0].metadata.source, "guide");
        assert_eq!(hits[0].metadata.document_id, doc.id.to_string());
    }

    #[tokio::test]
    async fn test_failed_indexing_removes_row() {
        let (processor, repo, collection) = setup().await;
        let embedder = MockEmbedder::new(8);

        let err = processor
            .ingest(&collection, long_text(), &embedder, &FailingStore)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::Upstream(AppError::VectorStore { .. })));

        let listed = repo.list_collections(collection.user_id).await.unwrap();
        assert_eq!(listed[0].document_count, 0);
    }

    #[tokio::test]
    async fn test_short_embedding_batch_is_rejected() {
        let (processor, repo, collection) = setup().await;
        let store = MemoryVectorStore::new();

        let err = processor
            .ingest(&collection, long_text(), &ShortEmbedder, &store)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestionError::EmbeddingCountMismatch { actual: 1, expected } if expected > 1
        ));

        let listed = repo.list_collections(collection.user_id).await.unwrap();
        assert_eq!(listed[0].document_count, 0);
        assert_eq!(store.len(&collection.vector_collection_name()).await.unwrap_or(0), 0);
    }

    #[tokio::test]
    async fn test_partial_upsert_leaves_no_vectors() {
        let (processor, repo, collection) = setup().await;
        let store = PartialStore(MemoryVectorStore::new());
        let embedder = MockEmbedder::new(8);
        let name = collection.vector_collection_name();

        let err = processor
            .ingest(&collection, long_text(), &embedder, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::Upstream(AppError::VectorStore { .. })));

        let listed = repo.list_collections(collection.user_id).await.unwrap();
        assert_eq!(listed[0].document_count, 0);
        assert_eq!(store.0.len(&name).await.unwrap_or(0), 0);

        let hits = store
            .query(&name, &embedder.embed("ownership").await.unwrap(), 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_remove_tolerates_vector_store_failure() {
        let (processor, repo, collection) = setup().await;
        let store = MemoryVectorStore::new();
        let embedder = MockEmbedder::new(8);

        let doc = processor
            .ingest(&collection, long_text(), &embedder, &store)
            .await
            .unwrap();

        processor
            .remove(&collection, &doc, &FailingStore)
            .await
            .unwrap();
        assert!(repo.find_document(collection.id, doc.id).await.unwrap().is_none());
    }
}
