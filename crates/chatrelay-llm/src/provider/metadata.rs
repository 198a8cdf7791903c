use async_trait::async_trait;
use chatrelay_core::chat::{ChatRequest, ChatResponse};
use crate::error::Result;
use crate::transformer::LLMStream;

/// Upstream completion service
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Get the provider ID
    fn provider_id(&self) -> &str;

    /// Get provider metadata
    fn metadata(&self) -> &ProviderMetadata;

    /// Send a chat request and get a complete response
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Send a chat request and stream the response.
    ///
    /// Returns once the upstream has accepted the request; dropping the
    /// stream releases the connection.
    async fn chat_stream(&self, request: ChatRequest) -> Result<LLMStream>;
}

/// Provider metadata
#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    /// Provider ID
    pub id: String,
    /// Human-readable name
    pub name: String,
}
