//! Text chunking module
//!
//! Splits document text into overlapping windows for embedding.
//! Markdown goes through the markdown-aware splitter so chunks
//! prefer heading and block boundaries.

use crate::errors::IngestionError;
use docchat_common::config::RagConfig;
use docchat_common::db::models::DocumentType;
use text_splitter::{ChunkConfig, MarkdownSplitter, TextSplitter};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between neighbouring chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}

impl From<&RagConfig> for ChunkingConfig {
    fn from(config: &RagConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }
}

/// A text chunk with its position in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub content: String,
    pub index: usize,
}

/// Split text into chunks for embedding
pub fn chunk_text(
    text: &str,
    doc_type: DocumentType,
    config: &ChunkingConfig,
) -> Result<Vec<TextChunk>, IngestionError> {
    let chunk_config = ChunkConfig::new(config.chunk_size)
        .with_overlap(config.chunk_overlap)
        .map_err(|e| IngestionError::ChunkingError(e.to_string()))?;

    let pieces: Vec<&str> = match doc_type {
        DocumentType::Markdown => MarkdownSplitter::new(chunk_config).chunks(text).collect(),
        DocumentType::Pdf | DocumentType::Text => {
            TextSplitter::new(chunk_config).chunks(text).collect()
        }
    };

    let chunks: Vec<TextChunk> = pieces
        .into_iter()
        .filter(|piece| !piece.trim().is_empty())
        .enumerate()
        .map(|(index, piece)| TextChunk {
            content: piece.to_string(),
            index,
        })
        .collect();

    debug!(
        input_len = text.len(),
        chunk_count = chunks.len(),
        chunk_size = config.chunk_size,
        doc_type = doc_type.as_str(),
        "Text chunked"
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_respect_size() {
        let text = "This is a test sentence. ".repeat(100);
        let config = ChunkingConfig::default();

        let chunks = chunk_text(&text, DocumentType::Text, &config).unwrap();
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(chunk.content.chars().count() <= config.chunk_size);
        }
    }

    #[test]
    fn test_neighbouring_chunks_overlap() {
        let text = (0..200).map(|i| format!("word{} ", i)).collect::<String>();
        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 30,
        };

        let chunks = chunk_text(&text, DocumentType::Text, &config).unwrap();
        assert!(chunks.len() >= 2);
        let first_tail = chunks[0].content.split_whitespace().last().unwrap();
        assert!(chunks[1].content.contains(first_tail));
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("Hello world.", DocumentType::Text, &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello world.");
    }

    #[test]
    fn test_markdown_splitter() {
        let text = format!(
            "# Intro\n\n{}\n\n# Details\n\n{}",
            "Intro text. ".repeat(30),
            "Detail text. ".repeat(30)
        );
        let chunks = chunk_text(&text, DocumentType::Markdown, &ChunkingConfig::default()).unwrap();
        assert!(chunks.len() >= 2);
        assert!(chunks[0].content.starts_with("# Intro"));
    }

    #[test]
    fn test_overlap_larger_than_size_is_rejected() {
        let config = ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 20,
        };
        assert!(matches!(
            chunk_text("text", DocumentType::Text, &config),
            Err(IngestionError::ChunkingError(_))
        ));
    }

    #[test]
    fn test_empty_text() {
        let chunks = chunk_text("", DocumentType::Text, &ChunkingConfig::default()).unwrap();
        assert!(chunks.is_empty());
    }
}
