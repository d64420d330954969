//! DocChat Common Library
//!
//! Shared code for the DocChat services including:
//! - Database models and repository patterns
//! - Embedding, vector store and LLM client abstractions
//! - Retrieval-augmented answering
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod telemetry;
pub mod vectordb;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::LlmClient;
pub use vectordb::VectorStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
