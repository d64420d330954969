//! Retrieval-augmented answering
//!
//! Embeds the question, pulls the closest chunks of a collection,
//! fills the prompt template and asks the LLM.

mod prompt;

pub use prompt::{build_context, build_prompt, unique_sources, CONTEXT_SEPARATOR};

use crate::embeddings::Embedder;
use crate::errors::Result;
use crate::llm::LlmClient;
use crate::vectordb::{ScoredChunk, VectorStore};
use std::time::Instant;
use tracing::{info, instrument};

/// Answer produced for one question
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub response: String,
    /// Document ids the context came from, in retrieval order
    pub sources: Vec<String>,
    pub hits: Vec<ScoredChunk>,
}

/// Answer `question` from the chunks stored under `collection`
#[instrument(skip_all, fields(collection = %collection, llm = %llm.name(), model = %llm.model()))]
pub async fn answer_question(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    llm: &dyn LlmClient,
    collection: &str,
    question: &str,
    top_k: usize,
) -> Result<ChatAnswer> {
    let query_embedding = embedder.embed(question).await?;
    let hits = store.query(collection, &query_embedding, top_k).await?;

    let context = build_context(&hits);
    let sources = unique_sources(&hits);
    let prompt = build_prompt(&context, question);

    let start = Instant::now();
    let result = llm.complete(&prompt).await;
    crate::metrics::record_llm(start.elapsed().as_secs_f64(), llm.name(), result.is_ok());
    let response = result?;

    info!(
        hits = hits.len(),
        sources = sources.len(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Answered question"
    );

    Ok(ChatAnswer {
        response,
        sources,
        hits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbedder;
    use crate::llm::MockLlm;
    use crate::vectordb::{chunk_vector_id, ChunkMetadata, MemoryVectorStore, VectorRecord};

    async fn seeded_store(embedder: &MockEmbedder) -> MemoryVectorStore {
        let store = MemoryVectorStore::new();
        let texts = [
            ("doc-a", "a.txt", "Rust guarantees memory safety through ownership"),
            ("doc-b", "b.txt", "Bread needs flour water and yeast"),
        ];

        for (doc, source, text) in texts {
            store
                .upsert(
                    "col",
                    vec![VectorRecord {
                        id: chunk_vector_id(doc, 0),
                        embedding: embedder.embed(text).await.unwrap(),
                        text: text.to_string(),
                        metadata: ChunkMetadata {
                            document_id: doc.to_string(),
                            chunk_index: 0,
                            source: source.to_string(),
                        },
                    }],
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_answer_uses_closest_chunk_first() {
        let embedder = MockEmbedder::new(256);
        let store = seeded_store(&embedder).await;
        let llm = MockLlm::new("llama2");

        let answer = answer_question(&embedder, &store, &llm, "col", "How does Rust ownership work", 1)
            .await
            .unwrap();

        assert_eq!(answer.sources, vec!["doc-a".to_string()]);
        assert_eq!(answer.hits.len(), 1);
        assert!(answer.response.contains("How does Rust ownership work"));
    }

    #[tokio::test]
    async fn test_empty_collection_still_answers() {
        let embedder = MockEmbedder::new(16);
        let store = MemoryVectorStore::new();
        let llm = MockLlm::new("llama2");

        let answer = answer_question(&embedder, &store, &llm, "empty", "anything?", 5)
            .await
            .unwrap();
        assert!(answer.sources.is_empty());
        assert!(!answer.response.is_empty());
    }
}
