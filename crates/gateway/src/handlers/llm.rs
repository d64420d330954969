//! LLM provider catalog

use axum::Json;
use docchat_common::llm::{ProviderInfo, PROVIDERS};

/// Every provider a user can choose, in display order
pub async fn list_providers() -> Json<&'static [ProviderInfo]> {
    Json(PROVIDERS)
}
