//! Static catalog of the chat providers a user can pick from

use serde::Serialize;

/// Default Ollama endpoint advertised for local providers
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";

/// Default provider for users without stored preferences
pub const DEFAULT_PROVIDER: &str = "ollama";

/// Default model for users without stored preferences
pub const DEFAULT_MODEL: &str = "llama2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Local,
    Remote,
}

/// One selectable provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<&'static str>,
    pub models: &'static [&'static str],
    pub requires_api_key: bool,
}

impl ProviderInfo {
    pub fn is_local(&self) -> bool {
        self.kind == ProviderKind::Local
    }

    /// The requested model, or the first one when none was given
    pub fn model_or_default<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested.map(str::trim) {
            Some(model) if !model.is_empty() => model,
            _ => self.models.first().copied().unwrap_or(DEFAULT_MODEL),
        }
    }
}

pub static PROVIDERS: &[ProviderInfo] = &[
    ProviderInfo {
        id: "ollama-llama2",
        name: "Llama 2 (Local)",
        kind: ProviderKind::Local,
        endpoint: Some(DEFAULT_OLLAMA_ENDPOINT),
        models: &["llama2", "llama2:13b", "llama2:70b"],
        requires_api_key: false,
    },
    ProviderInfo {
        id: "ollama-mistral",
        name: "Mistral (Local)",
        kind: ProviderKind::Local,
        endpoint: Some(DEFAULT_OLLAMA_ENDPOINT),
        models: &["mistral", "mistral:7b", "mistral:instruct"],
        requires_api_key: false,
    },
    ProviderInfo {
        id: "ollama-codellama",
        name: "Code Llama (Local)",
        kind: ProviderKind::Local,
        endpoint: Some(DEFAULT_OLLAMA_ENDPOINT),
        models: &["codellama", "codellama:13b", "codellama:34b"],
        requires_api_key: false,
    },
    ProviderInfo {
        id: "openai",
        name: "OpenAI GPT",
        kind: ProviderKind::Remote,
        endpoint: None,
        models: &["gpt-3.5-turbo", "gpt-4", "gpt-4-turbo"],
        requires_api_key: true,
    },
    ProviderInfo {
        id: "anthropic",
        name: "Anthropic Claude",
        kind: ProviderKind::Remote,
        endpoint: None,
        models: &["claude-3-sonnet", "claude-3-opus", "claude-3-haiku"],
        requires_api_key: true,
    },
];

/// Look up a provider; unknown or missing ids fall back to the first entry
pub fn find_provider(id: Option<&str>) -> &'static ProviderInfo {
    id.and_then(|id| PROVIDERS.iter().find(|p| p.id == id))
        .unwrap_or(&PROVIDERS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_provider() {
        assert_eq!(find_provider(Some("openai")).id, "openai");
        assert_eq!(find_provider(Some("anthropic")).models.len(), 3);
        assert_eq!(find_provider(Some("nope")).id, "ollama-llama2");
        assert_eq!(find_provider(None).id, "ollama-llama2");
    }

    #[test]
    fn test_model_fallback() {
        let mistral = find_provider(Some("ollama-mistral"));
        assert_eq!(mistral.model_or_default(None), "mistral");
        assert_eq!(mistral.model_or_default(Some("  ")), "mistral");
        assert_eq!(mistral.model_or_default(Some("mistral:7b")), "mistral:7b");
    }

    #[test]
    fn test_catalog_shape() {
        let local: Vec<_> = PROVIDERS.iter().filter(|p| p.is_local()).collect();
        assert_eq!(local.len(), 3);
        assert!(local.iter().all(|p| !p.requires_api_key && p.endpoint.is_some()));

        let json = serde_json::to_value(find_provider(Some("openai"))).unwrap();
        assert_eq!(json["type"], "remote");
        assert_eq!(json["requires_api_key"], true);
        assert!(json.get("endpoint").is_none());
    }
}
