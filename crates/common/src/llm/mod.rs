//! LLM provider abstraction
//!
//! Provides:
//! - The static provider catalog
//! - `LlmClient` implementations for Ollama, OpenAI and Anthropic
//! - A deterministic mock for tests and offline runs

mod anthropic;
mod catalog;
mod mock;
mod ollama;
mod openai;

pub use anthropic::AnthropicClient;
pub use catalog::{
    find_provider, ProviderInfo, ProviderKind, DEFAULT_MODEL, DEFAULT_OLLAMA_ENDPOINT,
    DEFAULT_PROVIDER, PROVIDERS,
};
pub use mock::MockLlm;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait for single-prompt completion
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name for logs and metrics
    fn name(&self) -> &str;

    /// Model the client talks to
    fn model(&self) -> &str;

    /// Send one user prompt and return the answer text
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Build the HTTP client shared by the providers
pub fn http_client(config: &LlmConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(Into::into)
}

/// Create a client for a catalog provider.
///
/// Remote providers need an API key. With `mock` enabled in the config every
/// provider is answered by [`MockLlm`].
pub fn create_llm_client(
    config: &LlmConfig,
    client: reqwest::Client,
    provider: &ProviderInfo,
    model: &str,
    api_key: Option<String>,
) -> Result<Arc<dyn LlmClient>> {
    let api_key = api_key.filter(|k| !k.trim().is_empty());

    if provider.requires_api_key && api_key.is_none() {
        return Err(AppError::validation(format!(
            "An API key is required for {}",
            provider.name
        )));
    }

    if config.mock {
        return Ok(Arc::new(MockLlm::new(model)));
    }

    match (provider.kind, provider.id, api_key) {
        (ProviderKind::Local, _, _) => Ok(Arc::new(OllamaClient::new(
            client,
            &config.ollama_url,
            model,
        ))),
        (ProviderKind::Remote, "openai", Some(key)) => Ok(Arc::new(OpenAIClient::new(
            client,
            &config.openai_url,
            key,
            model,
            config.max_tokens,
        ))),
        (ProviderKind::Remote, "anthropic", Some(key)) => Ok(Arc::new(AnthropicClient::new(
            client,
            &config.anthropic_url,
            key,
            model,
            config.max_tokens,
        ))),
        (_, id, _) => Err(AppError::validation(format!("Unsupported provider: {}", id))),
    }
}

/// Read a response body for an error message without failing on it
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("{}: {}", status, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_config() -> LlmConfig {
        LlmConfig {
            mock: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_remote_provider_requires_key() {
        let config = LlmConfig::default();
        let openai = find_provider(Some("openai"));

        let err = create_llm_client(&config, reqwest::Client::new(), openai, "gpt-4", None)
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(err.to_string().contains("OpenAI GPT"));

        let blank = create_llm_client(
            &config,
            reqwest::Client::new(),
            openai,
            "gpt-4",
            Some("  ".into()),
        );
        assert!(blank.is_err());
    }

    #[test]
    fn test_provider_dispatch() {
        let config = LlmConfig::default();

        let local = find_provider(Some("ollama-mistral"));
        let client =
            create_llm_client(&config, reqwest::Client::new(), local, "mistral", None).unwrap();
        assert_eq!(client.name(), "ollama");
        assert_eq!(client.model(), "mistral");

        let anthropic = find_provider(Some("anthropic"));
        let client = create_llm_client(
            &config,
            reqwest::Client::new(),
            anthropic,
            "claude-3-haiku",
            Some("sk-ant".into()),
        )
        .unwrap();
        assert_eq!(client.name(), "anthropic");
    }

    #[tokio::test]
    async fn test_mock_mode_still_checks_keys() {
        let config = mock_config();
        let openai = find_provider(Some("openai"));
        assert!(create_llm_client(&config, reqwest::Client::new(), openai, "gpt-4", None).is_err());

        let client = create_llm_client(
            &config,
            reqwest::Client::new(),
            find_provider(None),
            "llama2",
            None,
        )
        .unwrap();
        assert_eq!(client.name(), "mock");
        assert!(!client.complete("hello").await.unwrap().is_empty());
    }
}
