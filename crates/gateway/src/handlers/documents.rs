//! Document upload and management handlers

use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use docchat_common::{
    auth::AuthUser,
    db::models::Document,
    errors::{AppError, Result},
};
use docchat_ingestion::{extract, IngestionError, UploadSource};

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// Form fields of an upload
#[derive(Default)]
struct UploadForm {
    file: Option<UploadSource>,
    text: Option<String>,
    name: Option<String>,
    llm_provider: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(field_name) = field.name().map(str::to_string) else {
                continue;
            };

            match field_name.as_str() {
                "file" => {
                    let name = field.file_name().unwrap_or("upload").to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    form.file = Some(UploadSource::File {
                        name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                "text" => form.text = text_field(field).await?,
                "name" => form.name = text_field(field).await?,
                "llm_provider" | "llmProvider" => form.llm_provider = text_field(field).await?,
                _ => {}
            }
        }

        Ok(form)
    }

    /// A file wins over pasted text
    fn into_source(self) -> std::result::Result<UploadSource, IngestionError> {
        match (self.file, self.text) {
            (Some(file), _) => Ok(file),
            (None, Some(text)) if !text.is_empty() => Ok(UploadSource::Text {
                name: self.name,
                text,
            }),
            _ => Err(IngestionError::NoInput),
        }
    }
}

async fn text_field(field: Field<'_>) -> Result<Option<String>> {
    let value = field.text().await.map_err(multipart_error)?;
    Ok(Some(value).filter(|v| !v.is_empty()))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation {
        message: e.body_text(),
        field: None,
    }
}

/// Upload a file or pasted text into a collection and index it
pub async fn upload_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(collection_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Document>)> {
    let collection = state.owned_collection(auth.user_id, collection_id).await?;

    let form = UploadForm::read(multipart).await?;
    if let Some(provider) = form.llm_provider.as_deref() {
        tracing::debug!(provider, "Upload requested with LLM provider");
    }
    let extracted = extract(form.into_source()?)?;

    let embedder = state.embedder_for(auth.user_id).await?;
    let store = state.vector_store_for(auth.user_id).await?;

    let document = state
        .ingestion
        .ingest(&collection, extracted, embedder.as_ref(), store.as_ref())
        .await?;

    tracing::info!(
        document_id = %document.id,
        collection_id = %collection.id,
        doc_type = %document.doc_type,
        "Document uploaded"
    );

    Ok((StatusCode::CREATED, Json(document)))
}

/// A single document of a collection
pub async fn get_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((collection_id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Document>> {
    let collection = state.owned_collection(auth.user_id, collection_id).await?;

    let document = state
        .repo
        .find_document(collection.id, document_id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

    Ok(Json(document))
}

/// Delete a document and its vectors
pub async fn delete_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((collection_id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeleteResponse>> {
    let collection = state.owned_collection(auth.user_id, collection_id).await?;

    let document = state
        .repo
        .find_document(collection.id, document_id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

    let store = state.vector_store_for(auth.user_id).await?;
    state
        .ingestion
        .remove(&collection, &document, store.as_ref())
        .await?;

    Ok(Json(DeleteResponse { success: true }))
}
