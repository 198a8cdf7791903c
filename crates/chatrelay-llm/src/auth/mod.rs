use async_trait::async_trait;
use crate::error::Result;

/// Authenticator trait for different authentication methods
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Get the authentication header (header_name, header_value)
    /// Returns None if no authentication is needed
    async fn get_auth_header(&self) -> Result<Option<(String, String)>>;
}

/// API Key authenticator (OpenAI style `Authorization: Bearer <key>`)
#[derive(Clone)]
pub struct ApiKeyAuth {
    api_key: String,
}

impl ApiKeyAuth {
    /// Create a new API key authenticator
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth").field("api_key", &"<redacted>").finish()
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuth {
    async fn get_auth_header(&self) -> Result<Option<(String, String)>> {
        Ok(Some((
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        )))
    }
}

/// Custom header authenticator, for gateways that expect the key elsewhere
/// (e.g. `api-key: <key>` on Azure deployments)
#[derive(Clone)]
pub struct HeaderAuth {
    header: String,
    value: String,
}

impl HeaderAuth {
    pub fn new(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Debug for HeaderAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderAuth")
            .field("header", &self.header)
            .field("value", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Authenticator for HeaderAuth {
    async fn get_auth_header(&self) -> Result<Option<(String, String)>> {
        Ok(Some((self.header.clone(), self.value.clone())))
    }
}

/// No authentication
#[derive(Debug, Clone)]
pub struct NoAuth;

#[async_trait]
impl Authenticator for NoAuth {
    async fn get_auth_header(&self) -> Result<Option<(String, String)>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_api_key_header() {
        let auth = ApiKeyAuth::new("sk-test");
        let header = auth.get_auth_header().await.unwrap();
        assert_eq!(
            header,
            Some(("Authorization".to_string(), "Bearer sk-test".to_string()))
        );
    }

    #[tokio::test]
    async fn test_custom_header() {
        let auth = HeaderAuth::new("api-key", "secret");
        let header = auth.get_auth_header().await.unwrap();
        assert_eq!(header, Some(("api-key".to_string(), "secret".to_string())));
    }

    #[tokio::test]
    async fn test_no_auth() {
        assert_eq!(NoAuth.get_auth_header().await.unwrap(), None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", ApiKeyAuth::new("sk-secret"));
        assert!(!rendered.contains("sk-secret"));
    }
}
