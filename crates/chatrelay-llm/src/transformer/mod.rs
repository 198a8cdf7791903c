pub mod openai;

pub use openai::OpenAiTransformer;

use chatrelay_core::chat::{ChatChunk, ChatRequest, ChatResponse};
use serde_json::Value;
use std::pin::Pin;
use futures::Stream;

use crate::error::ConversionError;

/// Type alias for LLM stream
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, crate::LLMError>> + Send>>;

/// Schema transformer trait for converting between internal and provider formats
pub trait SchemaTransformer: Send + Sync {
    /// Get the provider ID
    fn provider_id(&self) -> &str;

    /// Transform request to provider-specific format
    fn transform_request(&self, request: &ChatRequest) -> Result<Value, ConversionError>;

    /// Parse the `data` field of one stream event.
    ///
    /// A single event may carry several chunks (a final content delta with
    /// its finish reason, for instance); they are returned in wire order.
    fn parse_stream_chunk(&self, data: &str) -> Result<Vec<ChatChunk>, ConversionError>;

    /// Parse a complete response (non-streaming)
    fn parse_response(&self, data: &Value) -> Result<ChatResponse, ConversionError>;
}
