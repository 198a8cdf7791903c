pub mod request;
pub mod response;
pub mod chunk;

pub use request::{ChatRequest, ChatOptions};
pub use response::{ChatResponse, ChatUsage};
pub use chunk::{ChatChunk, FinishReason};
