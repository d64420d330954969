//! DocChat ingestion
//!
//! Turns uploads into indexed documents:
//! - Text extraction from PDF, plain text and markdown uploads
//! - Fixed-size overlapping chunking
//! - Embedding and vector store upsert

pub mod chunker;
pub mod errors;
pub mod extract;
pub mod pdf;
pub mod processor;

pub use chunker::{chunk_text, ChunkingConfig, TextChunk};
pub use errors::IngestionError;
pub use extract::{extract, ExtractedDocument, UploadSource, DEFAULT_TEXT_NAME};
pub use processor::IngestionProcessor;
