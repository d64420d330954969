//! Chat over a collection's documents

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use docchat_common::{
    auth::AuthUser,
    chat::answer_question,
    errors::{AppError, Result},
    llm::{create_llm_client, find_provider},
};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "llmProvider")]
    pub llm_provider: Option<String>,
    #[serde(default, alias = "llmModel")]
    pub llm_model: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub sources: Vec<String>,
    pub session_id: Uuid,
}

/// Answer a question from the collection's documents and record the exchange
pub async fn chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(collection_id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let collection = state.owned_collection(auth.user_id, collection_id).await?;

    if request.message.trim().is_empty() {
        return Err(AppError::Validation {
            message: "Message is required".to_string(),
            field: Some("message".to_string()),
        });
    }

    let provider = find_provider(request.llm_provider.as_deref());
    let model = provider.model_or_default(request.llm_model.as_deref());
    let api_key = state.repo.find_api_key(auth.user_id, provider.id).await?;

    let llm = create_llm_client(
        &state.config.llm,
        state.http.clone(),
        provider,
        model,
        api_key,
    )?;
    let embedder = state.embedder_for(auth.user_id).await?;
    let store = state.vector_store_for(auth.user_id).await?;

    let answer = answer_question(
        embedder.as_ref(),
        store.as_ref(),
        llm.as_ref(),
        &collection.vector_collection_name(),
        &request.message,
        state.config.rag.top_k,
    )
    .await?;

    let session = state.repo.latest_or_new_session(collection.id).await?;
    state
        .repo
        .append_exchange(
            session.id,
            request.message,
            answer.response.clone(),
            answer.sources.clone(),
        )
        .await?;

    tracing::info!(
        collection_id = %collection.id,
        session_id = %session.id,
        provider = provider.id,
        model,
        hits = answer.hits.len(),
        "Chat answered"
    );

    Ok(Json(ChatResponse {
        response: answer.response,
        sources: answer.sources,
        session_id: session.id,
    }))
}
