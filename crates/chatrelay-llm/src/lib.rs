pub mod transformer;
pub mod provider;
pub mod providers;
pub mod error;
pub mod auth;

// Re-export core types
pub use error::{LLMError, ConversionError, Result};
pub use transformer::{SchemaTransformer, LLMStream, OpenAiTransformer};
pub use provider::{LLMProvider, BaseProvider, ProviderConfig, AuthConfig, ProviderMetadata};
pub use auth::{Authenticator, ApiKeyAuth, HeaderAuth, NoAuth};
pub use providers::OpenAiProvider;
