//! Vector store connection settings

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::AppState;
use docchat_common::{
    auth::AuthUser,
    db::models::Setting,
    errors::Result,
};

#[derive(Debug, Deserialize)]
pub struct SaveSettingRequest {
    #[serde(default, alias = "chromaApiKey")]
    pub chroma_api_key: String,
    #[serde(default, alias = "chromaTenant")]
    pub chroma_tenant: String,
    #[serde(default, alias = "chromaDatabase")]
    pub chroma_database: String,
}

/// The user's settings, newest first
pub async fn list_settings(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Setting>>> {
    Ok(Json(state.repo.list_settings(auth.user_id).await?))
}

/// Create or replace the user's settings
pub async fn save_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<SaveSettingRequest>,
) -> Result<(StatusCode, Json<Setting>)> {
    let setting = state
        .repo
        .upsert_setting(
            auth.user_id,
            request.chroma_api_key.trim().to_string(),
            request.chroma_tenant.trim().to_string(),
            request.chroma_database.trim().to_string(),
        )
        .await?;

    tracing::info!(user_id = %auth.user_id, "Vector store settings saved");

    Ok((StatusCode::CREATED, Json(setting)))
}
