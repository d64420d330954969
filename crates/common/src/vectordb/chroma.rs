//! Chroma client over the v2 REST API

use super::{ChunkMetadata, ScoredChunk, VectorRecord, VectorStore};
use crate::config::VectorStoreConfig;
use crate::db::models::Setting;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

const TOKEN_HEADER: &str = "x-chroma-token";

/// Tenant, database and token for one Chroma connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromaCredentials {
    pub tenant: String,
    pub database: String,
    pub token: Option<String>,
}

impl ChromaCredentials {
    /// Per-user settings win over the configured defaults, field by field
    pub fn resolve(config: &VectorStoreConfig, setting: Option<&Setting>) -> Self {
        let pick = |user: Option<&String>, fallback: &str| {
            user.map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };

        let token = setting
            .map(|s| s.chroma_api_key.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| config.api_key.clone().filter(|t| !t.is_empty()));

        Self {
            tenant: pick(setting.map(|s| &s.chroma_tenant), &config.tenant),
            database: pick(setting.map(|s| &s.chroma_database), &config.database),
            token,
        }
    }
}

pub struct ChromaStore {
    client: reqwest::Client,
    base_url: String,
    credentials: ChromaCredentials,
}

#[derive(Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    ids: Vec<&'a str>,
    embeddings: Vec<&'a [f32]>,
    documents: Vec<&'a str>,
    metadatas: Vec<&'a ChunkMetadata>,
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<ChunkMetadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

impl ChromaStore {
    pub fn new(client: reqwest::Client, base_url: &str, credentials: ChromaCredentials) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url, self.credentials.tenant, self.credentials.database
        )
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.credentials.token {
            Some(token) => builder.header(TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, action: &str) -> Result<reqwest::Response> {
        let response = builder.send().await.map_err(|e| AppError::VectorStore {
            message: format!("Chroma {} failed: {}", action, e),
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::VectorStore {
            message: format!("Chroma {} returned {}: {}", action, status, body),
        })
    }

    /// Chroma addresses records by collection id, not name
    async fn collection_id(&self, name: &str) -> Result<String> {
        let url = format!("{}/{}", self.collections_url(), name);
        let response = self
            .send(self.request(Method::GET, url), "collection lookup")
            .await?;

        let info: CollectionInfo = response.json().await.map_err(|e| AppError::VectorStore {
            message: format!("Invalid collection response: {}", e),
        })?;
        Ok(info.id)
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    fn name(&self) -> &str {
        "chroma"
    }

    async fn create_collection(&self, collection: &str) -> Result<()> {
        let body = json!({
            "name": collection,
            "metadata": { "hnsw:space": "cosine" },
            "get_or_create": true,
        });

        self.send(
            self.request(Method::POST, self.collections_url()).json(&body),
            "create collection",
        )
        .await?;

        tracing::debug!(collection, tenant = %self.credentials.tenant, "Chroma collection ready");
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        let url = format!("{}/{}", self.collections_url(), collection);
        let response = self
            .request(Method::DELETE, url)
            .send()
            .await
            .map_err(|e| AppError::VectorStore {
                message: format!("Chroma delete collection failed: {}", e),
            })?;

        // Already gone is as good as deleted
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::VectorStore {
            message: format!("Chroma delete collection returned {}: {}", status, body),
        })
    }

    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        // Upserting into a collection that was never created is allowed
        self.create_collection(collection).await?;
        let id = self.collection_id(collection).await?;

        let body = UpsertRequest {
            ids: records.iter().map(|r| r.id.as_str()).collect(),
            embeddings: records.iter().map(|r| r.embedding.as_slice()).collect(),
            documents: records.iter().map(|r| r.text.as_str()).collect(),
            metadatas: records.iter().map(|r| &r.metadata).collect(),
        };

        let url = format!("{}/{}/upsert", self.collections_url(), id);
        self.send(self.request(Method::POST, url).json(&body), "upsert")
            .await?;
        Ok(())
    }

    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let id = self.collection_id(collection).await?;

        let body = json!({
            "query_embeddings": [embedding],
            "n_results": k,
            "include": ["documents", "metadatas", "distances"],
        });

        let url = format!("{}/{}/query", self.collections_url(), id);
        let response = self
            .send(self.request(Method::POST, url).json(&body), "query")
            .await?;

        let result: QueryResponse = response.json().await.map_err(|e| AppError::VectorStore {
            message: format!("Invalid query response: {}", e),
        })?;

        Ok(flatten_query(result))
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let id = self.collection_id(collection).await?;
        let url = format!("{}/{}/delete", self.collections_url(), id);
        self.send(
            self.request(Method::POST, url).json(&json!({ "ids": ids })),
            "delete records",
        )
        .await?;
        Ok(())
    }
}

/// Results come back as one list per query embedding; only one is ever sent
fn flatten_query(result: QueryResponse) -> Vec<ScoredChunk> {
    let ids = result.ids.into_iter().next().unwrap_or_default();
    let mut documents = result
        .documents
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default()
        .into_iter();
    let mut metadatas = result
        .metadatas
        .and_then(|m| m.into_iter().next())
        .unwrap_or_default()
        .into_iter();
    let mut distances = result
        .distances
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default()
        .into_iter();

    ids.into_iter()
        .filter_map(|id| {
            let text = documents.next().flatten().unwrap_or_default();
            let metadata = metadatas.next().flatten();
            let distance = distances.next().flatten().unwrap_or(1.0);

            // Records written by other tools may lack our metadata
            let metadata = match metadata {
                Some(m) => m,
                None => {
                    tracing::warn!(id = %id, "Chroma record without chunk metadata, skipping");
                    return None;
                }
            };

            Some(ScoredChunk {
                id,
                text,
                metadata,
                score: 1.0 - distance,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn setting(key: &str, tenant: &str, database: &str) -> Setting {
        Setting {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            chroma_api_key: key.into(),
            chroma_tenant: tenant.into(),
            chroma_database: database.into(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_credentials_fall_back_to_config() {
        let config = VectorStoreConfig::default();
        let creds = ChromaCredentials::resolve(&config, None);
        assert_eq!(creds.tenant, "default_tenant");
        assert_eq!(creds.database, "default_database");
        assert_eq!(creds.token, None);
    }

    #[test]
    fn test_credentials_prefer_user_setting() {
        let config = VectorStoreConfig::default();
        let s = setting("tok", "acme", "");
        let creds = ChromaCredentials::resolve(&config, Some(&s));
        assert_eq!(creds.tenant, "acme");
        assert_eq!(creds.database, "default_database");
        assert_eq!(creds.token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_collections_url() {
        let store = ChromaStore::new(
            reqwest::Client::new(),
            "http://localhost:8000/",
            ChromaCredentials {
                tenant: "t".into(),
                database: "d".into(),
                token: None,
            },
        );
        assert_eq!(
            store.collections_url(),
            "http://localhost:8000/api/v2/tenants/t/databases/d/collections"
        );
    }

    #[test]
    fn test_flatten_query_response() {
        let raw = json!({
            "ids": [["d1_chunk_0", "d2_chunk_3", "foreign"]],
            "documents": [["alpha", "beta", "gamma"]],
            "metadatas": [[
                {"document_id": "d1", "chunk_index": 0, "source": "a.txt"},
                {"document_id": "d2", "chunk_index": 3, "source": "b.pdf"},
                null
            ]],
            "distances": [[0.1, 0.4, 0.5]]
        });

        let response: QueryResponse = serde_json::from_value(raw).unwrap();
        let hits = flatten_query(response);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "alpha");
        assert_eq!(hits[1].metadata.chunk_index, 3);
        assert!((hits[0].score - 0.9).abs() < 1e-6);
    }
}
