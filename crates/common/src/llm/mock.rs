//! Offline LLM that answers without a network call

use super::LlmClient;
use crate::errors::Result;
use async_trait::async_trait;

/// Replies with a fixed sentence that names the model and echoes the question
pub struct MockLlm {
    model: String,
}

impl MockLlm {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let question = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Question: "))
            .unwrap_or("")
            .trim();

        Ok(format!(
            "[{}] Answer to \"{}\" from {} characters of context.",
            self.model,
            question,
            prompt.chars().count()
        ))
    }
}
