use serde::{Deserialize, Serialize};

use crate::chat::ChatUsage;

/// One item of an upstream completion stream
#[derive(Debug, Clone, PartialEq)]
pub enum ChatChunk {
    /// Text content delta
    Content { text: String },
    /// Usage information
    Usage(ChatUsage),
    /// Generation finished for the choice
    Finish { reason: FinishReason },
    /// Upstream reported an error inside the stream
    Error { message: String },
    /// End-of-stream marker
    Done,
}

impl ChatChunk {
    /// Create a content chunk
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content { text: text.into() }
    }

    /// Create an error chunk
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }

    /// Create a finish chunk
    pub fn finish(reason: FinishReason) -> Self {
        Self::Finish { reason }
    }
}

/// Reason for finishing the generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Completed naturally
    #[default]
    Stop,
    /// Hit token limit
    Length,
    /// Tool calls were made
    ToolCalls,
    /// Content was filtered
    ContentFilter,
}

impl FinishReason {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
        }
    }
}

impl From<&str> for FinishReason {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "length" => Self::Length,
            "tool_calls" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            _ => Self::Stop,
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
