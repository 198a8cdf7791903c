use chatrelay_core::chat::{ChatChunk, ChatRequest, ChatResponse, ChatUsage, FinishReason};
use chatrelay_core::types::ChatMessage;
use serde_json::{json, Value};

use crate::error::ConversionError;
use crate::transformer::SchemaTransformer;

/// OpenAI-compatible schema transformer
/// Works with OpenAI API, Azure OpenAI, and compatible providers
pub struct OpenAiTransformer {
    stream_usage: bool,
}

impl OpenAiTransformer {
    /// Create a new OpenAI transformer
    pub fn new() -> Self {
        Self { stream_usage: true }
    }

    /// Request a trailing usage chunk on streams (`stream_options.include_usage`).
    /// Some compatible servers reject the field.
    pub fn with_stream_usage(mut self, enabled: bool) -> Self {
        self.stream_usage = enabled;
        self
    }

    fn convert_message(&self, msg: &ChatMessage) -> Value {
        json!({
            "role": msg.role.as_str(),
            "content": msg.content,
        })
    }

    fn parse_usage(&self, usage: &Value) -> Option<ChatUsage> {
        if !usage.is_object() {
            return None;
        }
        let count = |field: &str| {
            usage[field]
                .as_u64()
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        };
        let computed = ChatUsage::new(
            count("prompt_tokens").unwrap_or(0),
            count("completion_tokens").unwrap_or(0),
        );
        Some(ChatUsage {
            total_tokens: count("total_tokens").unwrap_or(computed.total_tokens),
            ..computed
        })
    }

    fn error_message(&self, error: &Value) -> String {
        error["message"]
            .as_str()
            .map(str::to_string)
            .or_else(|| error.as_str().map(str::to_string))
            .unwrap_or_else(|| error.to_string())
    }
}

impl Default for OpenAiTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaTransformer for OpenAiTransformer {
    fn provider_id(&self) -> &str {
        "openai"
    }

    fn transform_request(&self, request: &ChatRequest) -> Result<Value, ConversionError> {
        if request.model.is_empty() {
            return Err(ConversionError::MissingField("model".to_string()));
        }

        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| self.convert_message(m))
            .collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": request.stream,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        if request.stream && self.stream_usage {
            body["stream_options"] = json!({ "include_usage": true });
        }

        Ok(body)
    }

    fn parse_stream_chunk(&self, data: &str) -> Result<Vec<ChatChunk>, ConversionError> {
        let data = data.trim();

        // SSE [DONE] marker
        if data == "[DONE]" {
            return Ok(vec![ChatChunk::Done]);
        }
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let chunk: Value = serde_json::from_str(data)?;

        if let Some(error) = chunk.get("error").filter(|e| !e.is_null()) {
            return Ok(vec![ChatChunk::error(self.error_message(error))]);
        }

        let mut chunks = Vec::new();
        let choice = chunk["choices"].get(0);

        if let Some(content) = choice.and_then(|c| c["delta"]["content"].as_str()) {
            if !content.is_empty() {
                chunks.push(ChatChunk::content(content));
            }
        }

        if let Some(reason) = choice.and_then(|c| c["finish_reason"].as_str()) {
            chunks.push(ChatChunk::finish(FinishReason::from(reason)));
        }

        if let Some(usage) = chunk.get("usage").and_then(|u| self.parse_usage(u)) {
            chunks.push(ChatChunk::Usage(usage));
        }

        Ok(chunks)
    }

    fn parse_response(&self, data: &Value) -> Result<ChatResponse, ConversionError> {
        let id = data["id"].as_str().unwrap_or_default().to_string();
        let model = data["model"].as_str().unwrap_or_default().to_string();

        let choice = data["choices"]
            .get(0)
            .ok_or_else(|| ConversionError::MissingField("choices".to_string()))?;

        let message = choice
            .get("message")
            .filter(|m| m.is_object())
            .ok_or_else(|| ConversionError::MissingField("choices[0].message".to_string()))?;

        let text = match &message["content"] {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => {
                return Err(ConversionError::InvalidFormat(format!(
                    "message content is not a string: {}",
                    other
                )))
            }
        };

        let usage = data
            .get("usage")
            .and_then(|u| self.parse_usage(u))
            .unwrap_or_default();

        let finish_reason = choice["finish_reason"]
            .as_str()
            .map(FinishReason::from)
            .unwrap_or_default();

        Ok(ChatResponse {
            id,
            model,
            text,
            usage,
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_request() {
        let transformer = OpenAiTransformer::new();
        let request = ChatRequest::new("gpt-4")
            .with_message(ChatMessage::system("Be brief"))
            .with_message(ChatMessage::user("Hello"))
            .temperature(0.7)
            .max_tokens(50);

        let body = transformer.transform_request(&request).unwrap();
        assert_eq!(body["model"], "gpt-4");
        // Use approximate comparison for floating point
        let temp = body["temperature"].as_f64().unwrap();
        assert!((temp - 0.7).abs() < 0.001, "temperature should be approximately 0.7, got {}", temp);
        assert_eq!(body["max_tokens"], 50);
        assert_eq!(body["stream"], false);
        assert!(body.get("stream_options").is_none());

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "Hello");
    }

    #[test]
    fn test_transform_stream_request_usage_toggle() {
        let request = ChatRequest::new("gpt-4")
            .with_message(ChatMessage::user("Hello"))
            .stream();

        let body = OpenAiTransformer::new().transform_request(&request).unwrap();
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);

        let body = OpenAiTransformer::new()
            .with_stream_usage(false)
            .transform_request(&request)
            .unwrap();
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn test_parse_stream_chunk() {
        let transformer = OpenAiTransformer::new();

        // Test content chunk
        let chunk = r#"{"choices":[{"delta":{"content":"Hello"}}]}"#;
        assert_eq!(
            transformer.parse_stream_chunk(chunk).unwrap(),
            vec![ChatChunk::content("Hello")]
        );

        // Test finish chunk
        let finish = r#"{"choices":[{"delta":{},"finish_reason":"length"}]}"#;
        assert_eq!(
            transformer.parse_stream_chunk(finish).unwrap(),
            vec![ChatChunk::finish(FinishReason::Length)]
        );

        // Role-only delta carries nothing
        let role = r#"{"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#;
        assert!(transformer.parse_stream_chunk(role).unwrap().is_empty());

        assert_eq!(transformer.parse_stream_chunk("[DONE]").unwrap(), vec![ChatChunk::Done]);
    }

    #[test]
    fn test_parse_stream_chunk_combined() {
        let transformer = OpenAiTransformer::new();
        let data = r#"{"choices":[{"delta":{"content":"!"},"finish_reason":"stop"}],
                       "usage":{"prompt_tokens":4,"completion_tokens":2,"total_tokens":6}}"#;

        assert_eq!(
            transformer.parse_stream_chunk(data).unwrap(),
            vec![
                ChatChunk::content("!"),
                ChatChunk::finish(FinishReason::Stop),
                ChatChunk::Usage(ChatUsage::new(4, 2)),
            ]
        );
    }

    #[test]
    fn test_parse_stream_usage_only() {
        let transformer = OpenAiTransformer::new();
        let data = r#"{"choices":[],"usage":{"prompt_tokens":1,"completion_tokens":1}}"#;
        assert_eq!(
            transformer.parse_stream_chunk(data).unwrap(),
            vec![ChatChunk::Usage(ChatUsage::new(1, 1))]
        );
    }

    #[test]
    fn test_parse_usage_out_of_range_counts_saturate() {
        let transformer = OpenAiTransformer::new();
        let data = r#"{"choices":[],"usage":{"prompt_tokens":4294967295,"completion_tokens":1}}"#;
        assert_eq!(
            transformer.parse_stream_chunk(data).unwrap(),
            vec![ChatChunk::Usage(ChatUsage {
                prompt_tokens: u32::MAX,
                completion_tokens: 1,
                total_tokens: u32::MAX,
            })]
        );

        let data = r#"{"choices":[],"usage":{"prompt_tokens":1,"completion_tokens":2,"total_tokens":99999999999}}"#;
        assert_eq!(
            transformer.parse_stream_chunk(data).unwrap(),
            vec![ChatChunk::Usage(ChatUsage {
                prompt_tokens: 1,
                completion_tokens: 2,
                total_tokens: u32::MAX,
            })]
        );
    }

    #[test]
    fn test_parse_stream_error_event() {
        let transformer = OpenAiTransformer::new();
        let data = r#"{"error":{"message":"overloaded","type":"server_error"}}"#;
        assert_eq!(
            transformer.parse_stream_chunk(data).unwrap(),
            vec![ChatChunk::error("overloaded")]
        );
    }

    #[test]
    fn test_parse_stream_chunk_invalid_json() {
        let transformer = OpenAiTransformer::new();
        assert!(matches!(
            transformer.parse_stream_chunk("{not json"),
            Err(ConversionError::Json(_))
        ));
    }

    #[test]
    fn test_parse_response() {
        let transformer = OpenAiTransformer::new();
        let data = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi there"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
        });

        let response = transformer.parse_response(&data).unwrap();
        assert_eq!(response.id, "chatcmpl-1");
        assert_eq!(response.model, "gpt-4o-mini");
        assert_eq!(response.text, "Hi there");
        assert_eq!(response.usage.total_tokens, 12);
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn test_parse_response_missing_choices() {
        let transformer = OpenAiTransformer::new();
        let result = transformer.parse_response(&json!({"id": "x", "choices": []}));
        assert!(matches!(result, Err(ConversionError::MissingField(_))));
    }
}
