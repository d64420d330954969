//! Prompt assembly for retrieval-augmented answers

use crate::vectordb::ScoredChunk;

/// Separator between rendered chunks in the context block
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const TEMPLATE: &str = "
You are a helpful AI assistant that answers questions based on the provided context from documents.

Context from documents:
{context}

Question: {question}

Please provide a helpful and accurate answer based on the context above. If the context doesn't contain enough information to answer the question, please say so clearly. Always cite which documents you're referencing when possible.

Answer:";

/// Render retrieved chunks as `Document: <source>\nContent: <text>` blocks
pub fn build_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| format!("Document: {}\nContent: {}", hit.metadata.source, hit.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Fill the answer template
pub fn build_prompt(context: &str, question: &str) -> String {
    // Question goes in first; the template's {context} precedes it, so a
    // literal "{context}" inside the question is left alone
    TEMPLATE
        .replacen("{question}", question, 1)
        .replacen("{context}", context, 1)
}

/// Document ids of the hits, first occurrence wins
pub fn unique_sources(hits: &[ScoredChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for hit in hits {
        if !sources.contains(&hit.metadata.document_id) {
            sources.push(hit.metadata.document_id.clone());
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectordb::ChunkMetadata;

    fn hit(doc: &str, index: usize, source: &str, text: &str) -> ScoredChunk {
        ScoredChunk {
            id: format!("{}_chunk_{}", doc, index),
            text: text.to_string(),
            metadata: ChunkMetadata {
                document_id: doc.to_string(),
                chunk_index: index,
                source: source.to_string(),
            },
            score: 0.5,
        }
    }

    #[test]
    fn test_build_context() {
        let hits = vec![hit("d1", 0, "a.txt", "alpha"), hit("d2", 0, "b.pdf", "beta")];
        assert_eq!(
            build_context(&hits),
            "Document: a.txt\nContent: alpha\n\n---\n\nDocument: b.pdf\nContent: beta"
        );
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt("Document: a.txt\nContent: alpha", "What is alpha?");
        assert!(prompt.starts_with("\nYou are a helpful AI assistant"));
        assert!(prompt.contains("Context from documents:\nDocument: a.txt\nContent: alpha\n\nQuestion: What is alpha?\n"));
        assert!(prompt.ends_with("\n\nAnswer:"));
    }

    #[test]
    fn test_build_prompt_keeps_placeholders_in_question() {
        let prompt = build_prompt("alpha", "What does {context} mean?");
        assert!(prompt.contains("Context from documents:\nalpha\n"));
        assert!(prompt.contains("Question: What does {context} mean?\n"));
    }

    #[test]
    fn test_unique_sources_keeps_order() {
        let hits = vec![
            hit("d2", 1, "b", "x"),
            hit("d1", 0, "a", "y"),
            hit("d2", 0, "b", "z"),
        ];
        assert_eq!(unique_sources(&hits), vec!["d2".to_string(), "d1".to_string()]);
    }
}
