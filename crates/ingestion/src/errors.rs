//! Ingestion error types

use docchat_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Unsupported file type")]
    UnsupportedType { content_type: String },

    #[error("No file or text provided")]
    NoInput,

    #[error("Document content is empty")]
    EmptyContent,

    #[error("PDF parse error for {name}: {message}")]
    PdfParseError { name: String, message: String },

    #[error("Chunking error: {0}")]
    ChunkingError(String),

    #[error("Expected {expected} embeddings, got {actual}")]
    EmbeddingCountMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Upstream(#[from] AppError),
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::UnsupportedType { content_type } => {
                AppError::UnsupportedMediaType { content_type }
            }
            IngestionError::NoInput | IngestionError::EmptyContent => AppError::validation(e.to_string()),
            IngestionError::PdfParseError { .. } => AppError::validation(e.to_string()),
            IngestionError::ChunkingError(message) => AppError::Internal { message },
            IngestionError::EmbeddingCountMismatch { .. } => AppError::EmbeddingError {
                message: e.to_string(),
            },
            IngestionError::Upstream(inner) => inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_400() {
        let unsupported: AppError = IngestionError::UnsupportedType {
            content_type: "image/png".into(),
        }
        .into();
        assert_eq!(unsupported.status_code().as_u16(), 400);

        let empty: AppError = IngestionError::EmptyContent.into();
        assert_eq!(empty.status_code().as_u16(), 400);
        assert_eq!(empty.to_string(), "Document content is empty");

        let none: AppError = IngestionError::NoInput.into();
        assert_eq!(none.to_string(), "No file or text provided");
    }

    #[test]
    fn test_upstream_errors_pass_through() {
        let err: AppError = IngestionError::Upstream(AppError::VectorStore {
            message: "down".into(),
        })
        .into();
        assert!(matches!(err, AppError::VectorStore { .. }));
    }

    #[test]
    fn test_embedding_count_mismatch_is_embedding_error() {
        let err: AppError = IngestionError::EmbeddingCountMismatch {
            expected: 4,
            actual: 1,
        }
        .into();
        assert!(matches!(err, AppError::EmbeddingError { ref message } if message == "Expected 4 embeddings, got 1"));
    }
}
