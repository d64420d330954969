//! Application state shared across handlers

use axum::extract::FromRef;
use docchat_common::{
    auth::JwtManager,
    config::AppConfig,
    db::{models::Collection, DbPool, Repository},
    embeddings::{create_embedder, Embedder},
    errors::{AppError, Result},
    llm,
    vectordb::{VectorStore, VectorStoreFactory},
};
use docchat_ingestion::{ChunkingConfig, IngestionProcessor};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub repo: Repository,
    pub jwt: Arc<JwtManager>,
    pub vectors: VectorStoreFactory,
    pub ingestion: IngestionProcessor,
    /// Shared client for LLM provider calls
    pub http: reqwest::Client,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: DbPool) -> Result<Self> {
        let repo = Repository::new(db.clone());
        let jwt = Arc::new(JwtManager::from_config(
            config.auth.jwt_secret.as_deref(),
            config.auth.jwt_expiration_secs,
        ));
        let vectors =
            VectorStoreFactory::from_config(&config.vector_store, &db, config.embedding.dimension)?;
        let ingestion = IngestionProcessor::new(repo.clone(), ChunkingConfig::from(&config.rag));
        let http = llm::http_client(&config.llm)?;

        Ok(Self {
            config,
            db,
            repo,
            jwt,
            vectors,
            ingestion,
            http,
        })
    }

    /// Embedder for a user; their own OpenAI key wins over the configured one
    pub async fn embedder_for(&self, user_id: Uuid) -> Result<Arc<dyn Embedder>> {
        let user_key = self.repo.find_api_key(user_id, "openai").await?;
        create_embedder(&self.config.embedding, user_key, &self.config.llm.ollama_url)
    }

    /// Vector store configured with the user's saved settings
    pub async fn vector_store_for(&self, user_id: Uuid) -> Result<Arc<dyn VectorStore>> {
        let setting = self.repo.find_setting(user_id).await?;
        Ok(self.vectors.for_user(setting.as_ref()))
    }

    /// A collection owned by the user; anything else is reported as missing
    pub async fn owned_collection(&self, user_id: Uuid, id: Uuid) -> Result<Collection> {
        self.repo
            .find_owned_collection(id, user_id)
            .await?
            .ok_or_else(|| AppError::CollectionNotFound { id: id.to_string() })
    }
}
