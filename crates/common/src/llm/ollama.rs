//! Ollama chat client for locally served models

use super::{error_body, LlmClient};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

pub struct OllamaClient {
    client: reqwest::Client,
    host: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl OllamaClient {
    pub fn new(client: reqwest::Client, host: &str, model: &str) -> Self {
        Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn error(&self, message: String) -> AppError {
        AppError::Llm {
            provider: "ollama".to_string(),
            message,
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.error(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(self.error(error_body(response).await));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.error(format!("Invalid response: {}", e)))?;

        Ok(result.message.content)
    }
}
