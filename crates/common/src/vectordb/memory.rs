//! In-process vector store with brute-force cosine search

use super::{ScoredChunk, VectorRecord, VectorStore};
use crate::embeddings::cosine_similarity;
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, HashMap<String, VectorRecord>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection, if it exists
    pub async fn len(&self, collection: &str) -> Option<usize> {
        self.collections.read().await.get(collection).map(HashMap::len)
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_collection(&self, collection: &str) -> Result<()> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default();
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_string()).or_default();
        for record in records {
            entries.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let collections = self.collections.read().await;
        let Some(entries) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredChunk> = entries
            .values()
            .map(|record| ScoredChunk {
                id: record.id.clone(),
                text: record.text.clone(),
                metadata: record.metadata.clone(),
                score: cosine_similarity(embedding, &record.embedding),
            })
            .collect();

        // Ties broken by id to keep results stable
        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        if let Some(entries) = self.collections.write().await.get_mut(collection) {
            for id in ids {
                entries.remove(id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectordb::ChunkMetadata;

    fn record(id: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            embedding,
            text: format!("text of {}", id),
            metadata: ChunkMetadata {
                document_id: id.split('_').next().unwrap_or_default().to_string(),
                chunk_index: 0,
                source: "source.txt".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let store = MemoryVectorStore::new();
        store
            .upsert(
                "c",
                vec![
                    record("a_chunk_0", vec![1.0, 0.0]),
                    record("b_chunk_0", vec![0.7, 0.7]),
                    record("c_chunk_0", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.query("c", &[1.0, 0.1], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a_chunk_0");
        assert_eq!(hits[1].id, "b_chunk_0");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_delete_removes() {
        let store = MemoryVectorStore::new();
        store.create_collection("c").await.unwrap();
        assert_eq!(store.len("c").await, Some(0));

        store.upsert("c", vec![record("a_chunk_0", vec![1.0])]).await.unwrap();
        store.upsert("c", vec![record("a_chunk_0", vec![2.0])]).await.unwrap();
        assert_eq!(store.len("c").await, Some(1));

        store.delete("c", &["a_chunk_0".to_string()]).await.unwrap();
        assert_eq!(store.len("c").await, Some(0));

        store.delete_collection("c").await.unwrap();
        assert_eq!(store.len("c").await, None);
    }

    #[tokio::test]
    async fn test_query_unknown_collection_is_empty() {
        let store = MemoryVectorStore::new();
        assert!(store.query("missing", &[1.0], 5).await.unwrap().is_empty());
    }
}
