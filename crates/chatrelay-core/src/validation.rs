//! Caller input validation and option defaults.

use thiserror::Error;

use crate::chat::{ChatOptions, ChatRequest};
use crate::types::ChatMessage;

/// Caller-supplied input that cannot be forwarded upstream
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("message list must not be empty")]
    EmptyMessages,

    #[error("message {index} has empty content")]
    EmptyContent { index: usize },

    #[error("invalid option `{field}`: {reason}")]
    InvalidOption { field: &'static str, reason: String },

    #[error("model `{0}` is not available")]
    UnknownModel(String),

    #[error("malformed request: {0}")]
    Malformed(String),
}

impl ValidationError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            field,
            reason: reason.into(),
        }
    }
}

pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;

/// Values used for options the caller leaves out, plus the limits present
/// values are checked against.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDefaults {
    pub model: String,
    /// Models callers may request. Empty means any non-blank model id.
    pub allowed_models: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_tokens_limit: u32,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            allowed_models: Vec::new(),
            temperature: 0.7,
            max_tokens: 1024,
            max_tokens_limit: 16384,
        }
    }
}

impl RequestDefaults {
    /// Validate caller input and fill absent options.
    ///
    /// An empty message list is rejected before any option is looked at.
    pub fn resolve(
        &self,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<ChatRequest, ValidationError> {
        if messages.is_empty() {
            return Err(ValidationError::EmptyMessages);
        }

        if let Some(index) = messages.iter().position(ChatMessage::is_blank) {
            return Err(ValidationError::EmptyContent { index });
        }

        let model = match options.model {
            Some(model) => {
                let model = model.trim().to_string();
                if model.is_empty() {
                    return Err(ValidationError::invalid("model", "must not be blank"));
                }
                model
            }
            None => self.model.clone(),
        };

        if !self.allowed_models.is_empty() && !self.allowed_models.contains(&model) {
            return Err(ValidationError::UnknownModel(model));
        }

        let temperature = options.temperature.unwrap_or(self.temperature);
        if !temperature.is_finite() || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(ValidationError::invalid(
                "temperature",
                format!("must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}, got {temperature}"),
            ));
        }

        let max_tokens = options.max_tokens.unwrap_or(self.max_tokens);
        if max_tokens == 0 || max_tokens > self.max_tokens_limit {
            return Err(ValidationError::invalid(
                "maxTokens",
                format!("must be between 1 and {}, got {max_tokens}", self.max_tokens_limit),
            ));
        }

        Ok(ChatRequest {
            model,
            messages,
            temperature,
            max_tokens,
            stream: options.stream.unwrap_or(false),
        })
    }
}
