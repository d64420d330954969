//! SeaORM entity models
//!
//! Database entities for DocChat

mod api_key;
mod chat_message;
mod chat_session;
mod collection;
mod document;
mod setting;
mod user;

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// List of strings stored as a JSON array column
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StringList(pub Vec<String>);

impl From<Vec<String>> for StringList {
    fn from(items: Vec<String>) -> Self {
        Self(items)
    }
}

pub use user::{
    ActiveModel as UserActiveModel,
    Column as UserColumn,
    Entity as UserEntity,
    Model as User,
};

pub use collection::{
    ActiveModel as CollectionActiveModel,
    Column as CollectionColumn,
    Entity as CollectionEntity,
    Model as Collection,
};

pub use document::{
    ActiveModel as DocumentActiveModel,
    Column as DocumentColumn,
    DocumentType,
    Entity as DocumentEntity,
    Model as Document,
};

pub use chat_session::{
    ActiveModel as ChatSessionActiveModel,
    Column as ChatSessionColumn,
    Entity as ChatSessionEntity,
    Model as ChatSession,
};

pub use chat_message::{
    ActiveModel as ChatMessageActiveModel,
    Column as ChatMessageColumn,
    Entity as ChatMessageEntity,
    MessageRole,
    Model as ChatMessage,
};

pub use setting::{
    ActiveModel as SettingActiveModel,
    Column as SettingColumn,
    Entity as SettingEntity,
    Model as Setting,
};

pub use api_key::{
    ActiveModel as ApiKeyActiveModel,
    Column as ApiKeyColumn,
    Entity as ApiKeyEntity,
    Model as ApiKey,
};
