//! Vector store abstraction
//!
//! Chunks of every document collection live in a vector store collection
//! named after the database collection id. Backends:
//! - Chroma over its v2 REST API
//! - pgvector tables in the relational database
//! - An in-process store for tests and offline runs

mod chroma;
mod memory;
mod pgvector;

pub use chroma::{ChromaCredentials, ChromaStore};
pub use memory::MemoryVectorStore;
pub use pgvector::PgVectorStore;

use crate::config::VectorStoreConfig;
use crate::db::models::Setting;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Metadata stored next to every chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub chunk_index: usize,
    /// Name of the document the chunk came from
    pub source: String,
}

/// A chunk ready to be written to the store
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk returned by a similarity query, best match first
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity, higher is closer
    pub score: f32,
}

/// Id of the `index`-th chunk of a document
pub fn chunk_vector_id(document_id: &str, index: usize) -> String {
    format!("{}_chunk_{}", document_id, index)
}

/// Trait for vector storage backends
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Create a collection; existing collections are left untouched
    async fn create_collection(&self, collection: &str) -> Result<()>;

    /// Drop a collection and everything in it
    async fn delete_collection(&self, collection: &str) -> Result<()>;

    /// Insert or replace records
    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()>;

    /// Nearest neighbours of `embedding`, at most `k`
    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Remove records by id
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()>;
}

/// Hands out the vector store a request should talk to.
///
/// Chroma connections are per user: a user's stored settings override the
/// configured tenant, database and token.
#[derive(Clone)]
pub enum VectorStoreFactory {
    Chroma {
        client: reqwest::Client,
        config: VectorStoreConfig,
    },
    PgVector(Arc<PgVectorStore>),
    Memory(Arc<MemoryVectorStore>),
}

impl VectorStoreFactory {
    /// Build the factory for the configured provider
    pub fn from_config(config: &VectorStoreConfig, db: &DbPool, dimension: usize) -> Result<Self> {
        match config.provider.as_str() {
            "chroma" => {
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(config.timeout_secs))
                    .build()?;
                Ok(Self::Chroma {
                    client,
                    config: config.clone(),
                })
            }
            "pgvector" => Ok(Self::PgVector(Arc::new(PgVectorStore::new(db.clone(), dimension)))),
            "memory" => Ok(Self::memory()),
            other => Err(AppError::Configuration {
                message: format!("Unknown vector store provider: {}", other),
            }),
        }
    }

    /// Factory over a fresh in-memory store
    pub fn memory() -> Self {
        Self::Memory(Arc::new(MemoryVectorStore::new()))
    }

    /// Provider name
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Chroma { .. } => "chroma",
            Self::PgVector(_) => "pgvector",
            Self::Memory(_) => "memory",
        }
    }

    /// Store for a user, given their saved settings
    pub fn for_user(&self, setting: Option<&Setting>) -> Arc<dyn VectorStore> {
        match self {
            Self::Chroma { client, config } => {
                let credentials = ChromaCredentials::resolve(config, setting);
                Arc::new(ChromaStore::new(client.clone(), &config.url, credentials))
            }
            Self::PgVector(store) => store.clone(),
            Self::Memory(store) => store.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_vector_id() {
        assert_eq!(chunk_vector_id("abc", 0), "abc_chunk_0");
        assert_eq!(chunk_vector_id("abc", 12), "abc_chunk_12");
    }

    #[tokio::test]
    async fn test_factory_providers() {
        let db = DbPool::in_memory().await.unwrap();

        let chroma = VectorStoreFactory::from_config(&VectorStoreConfig::default(), &db, 8).unwrap();
        assert_eq!(chroma.provider(), "chroma");
        assert_eq!(chroma.for_user(None).name(), "chroma");

        let memory = VectorStoreConfig {
            provider: "memory".into(),
            ..Default::default()
        };
        let factory = VectorStoreFactory::from_config(&memory, &db, 8).unwrap();
        assert_eq!(factory.for_user(None).name(), "memory");

        let unknown = VectorStoreConfig {
            provider: "faiss".into(),
            ..Default::default()
        };
        assert!(VectorStoreFactory::from_config(&unknown, &db, 8).is_err());
    }

    #[tokio::test]
    async fn test_memory_factory_shares_one_store() {
        let factory = VectorStoreFactory::memory();
        let a = factory.for_user(None);
        let b = factory.for_user(None);

        a.upsert(
            "c1",
            vec![VectorRecord {
                id: "d_chunk_0".into(),
                embedding: vec![1.0, 0.0],
                text: "hello".into(),
                metadata: ChunkMetadata {
                    document_id: "d".into(),
                    chunk_index: 0,
                    source: "doc".into(),
                },
            }],
        )
        .await
        .unwrap();

        assert_eq!(b.query("c1", &[1.0, 0.0], 5).await.unwrap().len(), 1);
    }
}
