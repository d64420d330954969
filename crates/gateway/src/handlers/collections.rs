//! Collection management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use docchat_common::{
    auth::AuthUser,
    db::{models::Collection, CollectionDetail, CollectionWithCounts},
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCollectionRequest {
    #[validate(length(max = 200))]
    #[serde(default)]
    pub name: String,

    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// The user's collections with their documents
pub async fn list_collections(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<CollectionWithCounts>>> {
    Ok(Json(state.repo.list_collections(auth.user_id).await?))
}

/// Create a collection and its vector store counterpart
pub async fn create_collection(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateCollectionRequest>,
) -> Result<(StatusCode, Json<Collection>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation {
            message: "Name is required".to_string(),
            field: Some("name".to_string()),
        });
    }
    let description = request
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let collection = state
        .repo
        .create_collection(auth.user_id, name.to_string(), description)
        .await?;

    let store = state.vector_store_for(auth.user_id).await?;
    if let Err(e) = store
        .create_collection(&collection.vector_collection_name())
        .await
    {
        tracing::warn!(
            collection_id = %collection.id,
            store = store.name(),
            error = %e,
            "Failed to create vector collection, continuing"
        );
    }

    tracing::info!(collection_id = %collection.id, user_id = %auth.user_id, "Collection created");

    Ok((StatusCode::CREATED, Json(collection)))
}

/// A collection with its documents and chat history
pub async fn get_collection(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(collection_id): Path<Uuid>,
) -> Result<Json<CollectionDetail>> {
    let collection = state.owned_collection(auth.user_id, collection_id).await?;
    Ok(Json(state.repo.collection_detail(collection).await?))
}

/// Delete a collection, its vectors and everything stored under it
pub async fn delete_collection(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(collection_id): Path<Uuid>,
) -> Result<Json<DeleteResponse>> {
    let collection = state.owned_collection(auth.user_id, collection_id).await?;

    let store = state.vector_store_for(auth.user_id).await?;
    if let Err(e) = store
        .delete_collection(&collection.vector_collection_name())
        .await
    {
        tracing::warn!(
            collection_id = %collection.id,
            store = store.name(),
            error = %e,
            "Failed to delete vector collection, continuing"
        );
    }

    state.repo.delete_collection(collection.id).await?;

    tracing::info!(collection_id = %collection.id, user_id = %auth.user_id, "Collection deleted");

    Ok(Json(DeleteResponse { success: true }))
}
