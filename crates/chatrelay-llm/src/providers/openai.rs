use async_trait::async_trait;
use chatrelay_core::chat::{ChatRequest, ChatResponse};

use crate::error::Result;
use crate::provider::{BaseProvider, LLMProvider, ProviderConfig, ProviderMetadata};
use crate::transformer::{LLMStream, OpenAiTransformer};

/// OpenAI Provider
/// Uses OpenAI API or compatible endpoints (Azure, vLLM, Ollama, proxies)
pub struct OpenAiProvider {
    base: BaseProvider<OpenAiTransformer>,
}

impl OpenAiProvider {
    /// Create with custom configuration
    pub fn with_config(config: ProviderConfig) -> Result<Self> {
        let metadata = ProviderMetadata {
            id: config.provider_id.clone(),
            name: if config.provider_id == "openai" {
                "OpenAI".to_string()
            } else {
                format!("OpenAI-compatible ({})", config.provider_id)
            },
        };
        let transformer = OpenAiTransformer::new().with_stream_usage(config.stream_usage);

        let base = BaseProvider::new(config, transformer, metadata)?;

        Ok(Self { base })
    }

    pub fn config(&self) -> &ProviderConfig {
        self.base.config()
    }
}

#[async_trait]
impl LLMProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        self.base.provider_id()
    }

    fn metadata(&self) -> &ProviderMetadata {
        &self.base.metadata
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.base.send_request(request).await
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<LLMStream> {
        self.base.send_stream_request(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_provider() {
        let config = ProviderConfig::new("openai", "https://custom.openai.com/v1").with_api_key("test-key");
        let provider = OpenAiProvider::with_config(config).unwrap();
        assert_eq!(provider.provider_id(), "openai");
        assert_eq!(provider.metadata().name, "OpenAI");
        assert_eq!(
            provider.config().completions_url(),
            "https://custom.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_compatible_provider_name() {
        let config = ProviderConfig::new("local", "http://127.0.0.1:8000/v1");
        let provider = OpenAiProvider::with_config(config).unwrap();
        assert_eq!(provider.provider_id(), "local");
        assert!(provider.metadata().name.contains("local"));
    }
}
