//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, LoaderTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

/// Number of records a user owns
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct UserCounts {
    pub collections: u64,
    pub api_keys: u64,
}

/// Collection with its documents, as listed on the overview
#[derive(Debug, Clone, Serialize)]
pub struct CollectionWithCounts {
    #[serde(flatten)]
    pub collection: Collection,
    pub documents: Vec<Document>,
    pub document_count: usize,
}

/// Chat session with its messages, oldest first
#[derive(Debug, Clone, Serialize)]
pub struct SessionWithMessages {
    #[serde(flatten)]
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
}

/// Collection with documents (newest first) and its chat history
#[derive(Debug, Clone, Serialize)]
pub struct CollectionDetail {
    #[serde(flatten)]
    pub collection: Collection,
    pub documents: Vec<Document>,
    pub chat_sessions: Vec<SessionWithMessages>,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Create a new user. The email must already be normalized.
    pub async fn create_user(
        &self,
        email: String,
        password_hash: String,
        name: Option<String>,
    ) -> Result<User> {
        let now = Utc::now();

        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            password_hash: Set(password_hash),
            name: Set(name),
            llm_provider: Set(None),
            llm_model: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        user.insert(self.conn()).await.map_err(Into::into)
    }

    /// Find user by (normalized) email
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by ID
    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn load_user(&self, id: Uuid) -> Result<UserActiveModel> {
        UserEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .map(Into::into)
            .ok_or(AppError::UserNotFound)
    }

    /// Set or clear the display name
    pub async fn update_user_name(&self, id: Uuid, name: Option<String>) -> Result<User> {
        let mut user = self.load_user(id).await?;
        user.name = Set(name);
        user.updated_at = Set(Utc::now().into());
        user.update(self.conn()).await.map_err(Into::into)
    }

    /// Replace the password hash
    pub async fn update_password(&self, id: Uuid, password_hash: String) -> Result<User> {
        let mut user = self.load_user(id).await?;
        user.password_hash = Set(password_hash);
        user.updated_at = Set(Utc::now().into());
        user.update(self.conn()).await.map_err(Into::into)
    }

    /// Store the preferred LLM provider and model
    pub async fn update_llm_preferences(
        &self,
        id: Uuid,
        provider: String,
        model: String,
    ) -> Result<User> {
        let mut user = self.load_user(id).await?;
        user.llm_provider = Set(Some(provider));
        user.llm_model = Set(Some(model));
        user.updated_at = Set(Utc::now().into());
        user.update(self.conn()).await.map_err(Into::into)
    }

    /// Count the collections and API keys a user owns
    pub async fn count_user_records(&self, user_id: Uuid) -> Result<UserCounts> {
        let collections = CollectionEntity::find()
            .filter(CollectionColumn::UserId.eq(user_id))
            .count(self.conn())
            .await?;

        let api_keys = ApiKeyEntity::find()
            .filter(ApiKeyColumn::UserId.eq(user_id))
            .count(self.conn())
            .await?;

        Ok(UserCounts {
            collections,
            api_keys,
        })
    }

    // ========================================================================
    // API Key Operations
    // ========================================================================

    /// All API keys of a user
    pub async fn list_api_keys(&self, user_id: Uuid) -> Result<Vec<ApiKey>> {
        ApiKeyEntity::find()
            .filter(ApiKeyColumn::UserId.eq(user_id))
            .order_by_asc(ApiKeyColumn::Provider)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// The user's key for one provider, if stored
    pub async fn find_api_key(&self, user_id: Uuid, provider: &str) -> Result<Option<String>> {
        let record = ApiKeyEntity::find()
            .filter(ApiKeyColumn::UserId.eq(user_id))
            .filter(ApiKeyColumn::Provider.eq(provider))
            .one(self.conn())
            .await?;

        Ok(record.map(|r| r.key))
    }

    /// Insert or replace the user's key for a provider
    pub async fn upsert_api_key(&self, user_id: Uuid, provider: &str, key: String) -> Result<ApiKey> {
        let now = Utc::now();

        let existing = ApiKeyEntity::find()
            .filter(ApiKeyColumn::UserId.eq(user_id))
            .filter(ApiKeyColumn::Provider.eq(provider))
            .one(self.conn())
            .await?;

        match existing {
            Some(record) => {
                let mut record: ApiKeyActiveModel = record.into();
                record.key = Set(key);
                record.updated_at = Set(now.into());
                record.update(self.conn()).await.map_err(Into::into)
            }
            None => {
                let record = ApiKeyActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    provider: Set(provider.to_string()),
                    key: Set(key),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                };
                record.insert(self.conn()).await.map_err(Into::into)
            }
        }
    }

    // ========================================================================
    // Setting Operations
    // ========================================================================

    /// Settings of a user, newest first
    pub async fn list_settings(&self, user_id: Uuid) -> Result<Vec<Setting>> {
        SettingEntity::find()
            .filter(SettingColumn::UserId.eq(user_id))
            .order_by_desc(SettingColumn::UpdatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// The user's current vector store settings
    pub async fn find_setting(&self, user_id: Uuid) -> Result<Option<Setting>> {
        SettingEntity::find()
            .filter(SettingColumn::UserId.eq(user_id))
            .order_by_desc(SettingColumn::UpdatedAt)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Insert or replace the user's vector store settings
    pub async fn upsert_setting(
        &self,
        user_id: Uuid,
        chroma_api_key: String,
        chroma_tenant: String,
        chroma_database: String,
    ) -> Result<Setting> {
        let now = Utc::now();

        match self.find_setting(user_id).await? {
            Some(record) => {
                let mut record: SettingActiveModel = record.into();
                record.chroma_api_key = Set(chroma_api_key);
                record.chroma_tenant = Set(chroma_tenant);
                record.chroma_database = Set(chroma_database);
                record.updated_at = Set(now.into());
                record.update(self.conn()).await.map_err(Into::into)
            }
            None => {
                let record = SettingActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    chroma_api_key: Set(chroma_api_key),
                    chroma_tenant: Set(chroma_tenant),
                    chroma_database: Set(chroma_database),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                };
                record.insert(self.conn()).await.map_err(Into::into)
            }
        }
    }

    // ========================================================================
    // Collection Operations
    // ========================================================================

    /// Create a new collection
    pub async fn create_collection(
        &self,
        user_id: Uuid,
        name: String,
        description: Option<String>,
    ) -> Result<Collection> {
        let now = Utc::now();

        let collection = CollectionActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            name: Set(name),
            description: Set(description),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        collection.insert(self.conn()).await.map_err(Into::into)
    }

    /// A user's collections with their documents, most recently updated first
    pub async fn list_collections(&self, user_id: Uuid) -> Result<Vec<CollectionWithCounts>> {
        let collections = CollectionEntity::find()
            .filter(CollectionColumn::UserId.eq(user_id))
            .order_by_desc(CollectionColumn::UpdatedAt)
            .all(self.conn())
            .await?;

        let documents = collections
            .load_many(
                DocumentEntity::find().order_by_desc(DocumentColumn::CreatedAt),
                self.conn(),
            )
            .await?;

        Ok(collections
            .into_iter()
            .zip(documents)
            .map(|(collection, documents)| CollectionWithCounts {
                document_count: documents.len(),
                collection,
                documents,
            })
            .collect())
    }

    /// Find a collection only if it belongs to the user
    pub async fn find_owned_collection(&self, id: Uuid, user_id: Uuid) -> Result<Option<Collection>> {
        CollectionEntity::find_by_id(id)
            .filter(CollectionColumn::UserId.eq(user_id))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Load documents and chat history of a collection
    pub async fn collection_detail(&self, collection: Collection) -> Result<CollectionDetail> {
        let documents = DocumentEntity::find()
            .filter(DocumentColumn::CollectionId.eq(collection.id))
            .order_by_desc(DocumentColumn::CreatedAt)
            .all(self.conn())
            .await?;

        let sessions = ChatSessionEntity::find()
            .filter(ChatSessionColumn::CollectionId.eq(collection.id))
            .order_by_asc(ChatSessionColumn::CreatedAt)
            .all(self.conn())
            .await?;

        let messages = sessions
            .load_many(ordered_messages(), self.conn())
            .await?;

        let chat_sessions = sessions
            .into_iter()
            .zip(messages)
            .map(|(session, messages)| SessionWithMessages { session, messages })
            .collect();

        Ok(CollectionDetail {
            collection,
            documents,
            chat_sessions,
        })
    }

    /// Delete a collection with its documents, sessions and messages in one transaction
    pub async fn delete_collection(&self, id: Uuid) -> Result<bool> {
        let txn = self.conn().begin().await?;

        let session_ids: Vec<Uuid> = ChatSessionEntity::find()
            .filter(ChatSessionColumn::CollectionId.eq(id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        if !session_ids.is_empty() {
            ChatMessageEntity::delete_many()
                .filter(ChatMessageColumn::SessionId.is_in(session_ids))
                .exec(&txn)
                .await?;
        }

        ChatSessionEntity::delete_many()
            .filter(ChatSessionColumn::CollectionId.eq(id))
            .exec(&txn)
            .await?;

        DocumentEntity::delete_many()
            .filter(DocumentColumn::CollectionId.eq(id))
            .exec(&txn)
            .await?;

        let result = CollectionEntity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    /// Create a document; vector ids are filled in once the chunks are stored
    pub async fn create_document(
        &self,
        collection_id: Uuid,
        name: String,
        content: String,
        doc_type: DocumentType,
    ) -> Result<Document> {
        let now = Utc::now();

        let document = DocumentActiveModel {
            id: Set(Uuid::new_v4()),
            collection_id: Set(collection_id),
            name: Set(name),
            content: Set(content),
            doc_type: Set(doc_type.into()),
            vector_ids: Set(StringList::default()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        document.insert(self.conn()).await.map_err(Into::into)
    }

    /// Record which vector store ids belong to a document
    pub async fn set_document_vector_ids(&self, id: Uuid, vector_ids: Vec<String>) -> Result<Document> {
        let mut document: DocumentActiveModel = DocumentEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })?
            .into();

        document.vector_ids = Set(vector_ids.into());
        document.updated_at = Set(Utc::now().into());
        document.update(self.conn()).await.map_err(Into::into)
    }

    /// Find a document inside a collection
    pub async fn find_document(&self, collection_id: Uuid, id: Uuid) -> Result<Option<Document>> {
        DocumentEntity::find_by_id(id)
            .filter(DocumentColumn::CollectionId.eq(collection_id))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Delete a document by ID
    pub async fn delete_document(&self, id: Uuid) -> Result<bool> {
        let result = DocumentEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Chat Operations
    // ========================================================================

    /// Most recent chat session of a collection, created when there is none
    pub async fn latest_or_new_session(&self, collection_id: Uuid) -> Result<ChatSession> {
        let latest = ChatSessionEntity::find()
            .filter(ChatSessionColumn::CollectionId.eq(collection_id))
            .order_by_desc(ChatSessionColumn::CreatedAt)
            .one(self.conn())
            .await?;

        if let Some(session) = latest {
            return Ok(session);
        }

        let now = Utc::now();
        let session = ChatSessionActiveModel {
            id: Set(Uuid::new_v4()),
            collection_id: Set(collection_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        session.insert(self.conn()).await.map_err(Into::into)
    }

    /// Persist a question and its answer in one transaction
    pub async fn append_exchange(
        &self,
        session_id: Uuid,
        question: String,
        answer: String,
        sources: Vec<String>,
    ) -> Result<(ChatMessage, ChatMessage)> {
        let now = Utc::now();
        let txn = self.conn().begin().await?;

        let user_message = ChatMessageActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(session_id),
            role: Set(MessageRole::User.into()),
            content: Set(question),
            sources: Set(StringList::default()),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        let assistant_message = ChatMessageActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(session_id),
            role: Set(MessageRole::Assistant.into()),
            content: Set(answer),
            sources: Set(sources.into()),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        let mut session: ChatSessionActiveModel = ChatSessionEntity::find_by_id(session_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource_type: "chat_session".to_string(),
                id: session_id.to_string(),
            })?
            .into();
        session.updated_at = Set(now.into());
        session.update(&txn).await?;

        txn.commit().await?;
        Ok((user_message, assistant_message))
    }

    /// Messages of a session, oldest first
    pub async fn list_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        ordered_messages()
            .filter(ChatMessageColumn::SessionId.eq(session_id))
            .all(self.conn())
            .await
            .map_err(Into::into)
    }
}

/// Messages oldest first; a question and its answer share a timestamp,
/// so "user" sorts ahead of "assistant" on ties.
fn ordered_messages() -> sea_orm::Select<ChatMessageEntity> {
    ChatMessageEntity::find()
        .order_by_asc(ChatMessageColumn::CreatedAt)
        .order_by_desc(ChatMessageColumn::Role)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> Repository {
        Repository::new(DbPool::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_user_lifecycle() {
        let repo = repo().await;
        let user = repo
            .create_user("a@b.co".into(), "hash".into(), Some("Ann".into()))
            .await
            .unwrap();

        let found = repo.find_user_by_email("a@b.co").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        let renamed = repo.update_user_name(user.id, None).await.unwrap();
        assert_eq!(renamed.name, None);

        let prefs = repo
            .update_llm_preferences(user.id, "openai".into(), "gpt-4".into())
            .await
            .unwrap();
        assert_eq!(prefs.llm_provider.as_deref(), Some("openai"));
    }

    #[tokio::test]
    async fn test_api_key_upsert_replaces() {
        let repo = repo().await;
        let user = repo.create_user("a@b.co".into(), "h".into(), None).await.unwrap();

        repo.upsert_api_key(user.id, "openai", "k1".into()).await.unwrap();
        repo.upsert_api_key(user.id, "openai", "k2".into()).await.unwrap();
        repo.upsert_api_key(user.id, "anthropic", "k3".into()).await.unwrap();

        let keys = repo.list_api_keys(user.id).await.unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(repo.find_api_key(user.id, "openai").await.unwrap().as_deref(), Some("k2"));

        let counts = repo.count_user_records(user.id).await.unwrap();
        assert_eq!(counts, UserCounts { collections: 0, api_keys: 2 });
    }

    #[tokio::test]
    async fn test_setting_upsert_keeps_single_row() {
        let repo = repo().await;
        let user = repo.create_user("a@b.co".into(), "h".into(), None).await.unwrap();

        repo.upsert_setting(user.id, "k".into(), "t".into(), "d".into()).await.unwrap();
        let updated = repo
            .upsert_setting(user.id, "k2".into(), "t2".into(), "d2".into())
            .await
            .unwrap();

        let all = repo.list_settings(user.id).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, updated.id);
        assert_eq!(all[0].chroma_tenant, "t2");
    }

    #[tokio::test]
    async fn test_collection_ownership_and_cascade() {
        let repo = repo().await;
        let owner = repo.create_user("o@b.co".into(), "h".into(), None).await.unwrap();
        let other = repo.create_user("x@b.co".into(), "h".into(), None).await.unwrap();

        let collection = repo
            .create_collection(owner.id, "Papers".into(), None)
            .await
            .unwrap();
        assert!(repo
            .find_owned_collection(collection.id, other.id)
            .await
            .unwrap()
            .is_none());

        let doc = repo
            .create_document(collection.id, "a.txt".into(), "hello".into(), DocumentType::Text)
            .await
            .unwrap();
        let doc = repo
            .set_document_vector_ids(doc.id, vec![format!("{}_chunk_0", doc.id)])
            .await
            .unwrap();
        assert_eq!(doc.vector_ids.0.len(), 1);

        let session = repo.latest_or_new_session(collection.id).await.unwrap();
        repo.append_exchange(session.id, "q".into(), "a".into(), vec![doc.id.to_string()])
            .await
            .unwrap();

        let listed = repo.list_collections(owner.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].document_count, 1);

        assert!(repo.delete_collection(collection.id).await.unwrap());
        assert!(repo.find_document(collection.id, doc.id).await.unwrap().is_none());
        assert!(repo.list_messages(session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exchange_order_and_session_reuse() {
        let repo = repo().await;
        let user = repo.create_user("a@b.co".into(), "h".into(), None).await.unwrap();
        let collection = repo.create_collection(user.id, "C".into(), None).await.unwrap();

        let first = repo.latest_or_new_session(collection.id).await.unwrap();
        let second = repo.latest_or_new_session(collection.id).await.unwrap();
        assert_eq!(first.id, second.id);

        repo.append_exchange(first.id, "question".into(), "answer".into(), vec!["d1".into()])
            .await
            .unwrap();

        let messages = repo.list_messages(first.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert!(messages[0].sources.0.is_empty());
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[1].sources.0, vec!["d1".to_string()]);

        let detail = repo.collection_detail(collection).await.unwrap();
        assert_eq!(detail.chat_sessions.len(), 1);
        assert_eq!(detail.chat_sessions[0].messages.len(), 2);
    }
}
