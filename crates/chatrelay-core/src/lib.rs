pub mod types;
pub mod chat;
pub mod validation;

pub use types::{ChatMessage, Role};

pub use chat::{
    ChatRequest,
    ChatResponse,
    ChatChunk,
    ChatOptions,
    ChatUsage,
    FinishReason,
};

pub use validation::{RequestDefaults, ValidationError};
