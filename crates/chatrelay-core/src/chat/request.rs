use serde::{Deserialize, Serialize};
use crate::types::ChatMessage;

/// Options supplied by the caller alongside the messages.
///
/// Every field is optional on the wire; absent values are filled from
/// [`RequestDefaults`](crate::validation::RequestDefaults) during validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set temperature (0.0 - 2.0)
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Enable streaming
    pub fn with_streaming(mut self) -> Self {
        self.stream = Some(true);
        self
    }
}

/// Chat completion request with every option resolved.
///
/// This is what the upstream client consumes; build it through
/// `RequestDefaults::resolve` for caller input.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

impl ChatRequest {
    /// Create a new chat request
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: 1.0,
            max_tokens: 1024,
            stream: false,
        }
    }

    /// Add a message to the request
    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Enable streaming
    pub fn stream(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Set temperature
    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    /// Set max tokens
    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_builder() {
        let request = ChatRequest::new("gpt-4")
            .with_message(ChatMessage::user("Hello"))
            .temperature(0.7)
            .max_tokens(100);

        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.max_tokens, 100);
        assert!(!request.stream);
    }

    #[test]
    fn test_chat_options() {
        let options = ChatOptions::new()
            .with_temperature(0.5)
            .with_max_tokens(200)
            .with_streaming();

        assert_eq!(options.temperature, Some(0.5));
        assert_eq!(options.max_tokens, Some(200));
        assert_eq!(options.stream, Some(true));
        assert!(options.model.is_none());
    }

    #[test]
    fn test_chat_options_camel_case() {
        let options: ChatOptions =
            serde_json::from_str(r#"{"model":"m","maxTokens":64,"stream":true}"#).unwrap();
        assert_eq!(options.model.as_deref(), Some("m"));
        assert_eq!(options.max_tokens, Some(64));
        assert_eq!(options.stream, Some(true));
        assert_eq!(options.temperature, None);
    }
}
