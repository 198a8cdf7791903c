use async_trait::async_trait;
use chatrelay_core::chat::{ChatChunk, ChatRequest, ChatResponse};
use eventsource_stream::Eventsource;
use futures::{stream, StreamExt};
use reqwest::{header, Client};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::future::Future;
use std::sync::Arc;

use crate::auth::{ApiKeyAuth, Authenticator, HeaderAuth, NoAuth};
use crate::error::{LLMError, Result};
use crate::provider::{AuthConfig, LLMProvider, ProviderConfig, ProviderMetadata};
use crate::transformer::{LLMStream, SchemaTransformer};

/// Used when a 429 carries no usable `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Longest upstream error body quoted back in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Most bytes of an upstream error body read before giving up on the rest.
const MAX_ERROR_BODY_READ: usize = 64 * 1024;

/// Base provider implementation
/// Handles common HTTP functionality and delegates schema transformation
pub struct BaseProvider<T: SchemaTransformer> {
    config: ProviderConfig,
    http_client: ClientWithMiddleware,
    transformer: Arc<T>,
    pub metadata: ProviderMetadata,
    authenticator: Arc<dyn Authenticator>,
}

impl<T: SchemaTransformer + 'static> BaseProvider<T> {
    /// Create a new base provider
    pub fn new(config: ProviderConfig, transformer: T, metadata: ProviderMetadata) -> Result<Self> {
        let authenticator: Arc<dyn Authenticator> = match &config.auth {
            AuthConfig::ApiKey { key } => Arc::new(ApiKeyAuth::new(key.clone())),
            AuthConfig::Header { name, value } => Arc::new(HeaderAuth::new(name.clone(), value.clone())),
            AuthConfig::None => Arc::new(NoAuth),
        };

        Self::with_authenticator(config, transformer, metadata, authenticator)
    }

    /// Create with a custom authenticator
    pub fn with_authenticator(
        config: ProviderConfig,
        transformer: T,
        metadata: ProviderMetadata,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self> {
        let http_client = Self::build_http_client(&config)?;

        Ok(Self {
            config,
            http_client,
            transformer: Arc::new(transformer),
            metadata,
            authenticator,
        })
    }

    /// Client with retry middleware. Retries only cover the request/response
    /// handshake; a stream body is never replayed. No per-attempt timeout is
    /// set; calls are bounded by `within_timeout`.
    fn build_http_client(config: &ProviderConfig) -> Result<ClientWithMiddleware> {
        let retry_policy = ExponentialBackoff::builder()
            .base(2)
            .build_with_max_retries(config.max_retries);

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| LLMError::Config(e.to_string()))?;

        Ok(reqwest_middleware::ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build())
    }

    /// Get the provider ID
    pub fn provider_id(&self) -> &str {
        &self.config.provider_id
    }

    /// Get the config
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Build request headers
    async fn build_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));

        // Add authentication header
        if let Some((header_name, header_value)) = self.authenticator.get_auth_header().await? {
            let name = header::HeaderName::from_bytes(header_name.as_bytes())
                .map_err(|e| LLMError::Config(format!("Invalid auth header name: {}", e)))?;
            let value = header::HeaderValue::from_str(&header_value)
                .map_err(|e| LLMError::Config(format!("Invalid auth header value: {}", e)))?;
            headers.insert(name, value);
        }

        // Add custom headers from config
        for (key, value) in &self.config.headers {
            let header_name = header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| LLMError::Config(format!("Invalid header name: {}", e)))?;
            let header_value = header::HeaderValue::from_str(value)
                .map_err(|e| LLMError::Config(format!("Invalid header value: {}", e)))?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }

    /// Map a non-success upstream response to an error.
    ///
    /// Headers are read before the body is consumed so `Retry-After` survives.
    async fn error_from_response(response: reqwest::Response) -> LLMError {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = read_error_body(response).await;
        let message = upstream_error_message(&body);

        match status {
            401 | 403 => LLMError::Auth(message),
            429 => LLMError::RateLimited {
                retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            },
            _ => LLMError::Api { status, message },
        }
    }

    /// Run `fut` under the configured request timeout. Retries happen inside
    /// the deadline, so it bounds the whole call rather than one attempt.
    async fn within_timeout<F, R>(&self, fut: F) -> Result<R>
    where
        F: Future<Output = Result<R>>,
    {
        tokio::time::timeout(self.config.timeout, fut)
            .await
            .map_err(|_| LLMError::Timeout(format!("no response within {:?}", self.config.timeout)))?
    }

    /// POST `body` and return the response once its status is a success.
    async fn post(&self, body: &serde_json::Value, stream: bool) -> Result<reqwest::Response> {
        let headers = self.build_headers().await?;
        let mut builder = self.http_client.post(self.config.completions_url()).headers(headers);
        if stream {
            builder = builder.header(header::ACCEPT, "text/event-stream");
        }

        let response = builder.json(body).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(response)
    }

    /// Send a non-streaming request
    pub async fn send_request(&self, request: ChatRequest) -> Result<ChatResponse> {
        let mut request = request;
        request.stream = false;

        let body = self.transformer.transform_request(&request)?;

        log::debug!(
            "POST {} model={} messages={}",
            self.config.completions_url(),
            request.model,
            request.messages.len()
        );

        let text = self
            .within_timeout(async {
                let response = self.post(&body, false).await?;
                Ok::<_, LLMError>(response.text().await?)
            })
            .await?;

        let response_data: serde_json::Value = serde_json::from_str(&text)
            .map_err(crate::error::ConversionError::from)?;

        Ok(self.transformer.parse_response(&response_data)?)
    }

    /// Send a streaming request.
    ///
    /// The request timeout covers everything up to an accepted response,
    /// including reading an error body. After that the returned stream yields
    /// one item per parsed chunk, in the order the upstream sent them; the
    /// caller bounds the wait between items.
    pub async fn send_stream_request(&self, request: ChatRequest) -> Result<LLMStream> {
        let mut request = request;
        request.stream = true;

        let body = self.transformer.transform_request(&request)?;

        log::debug!(
            "POST {} (stream) model={} messages={}",
            self.config.completions_url(),
            request.model,
            request.messages.len()
        );

        let response = self.within_timeout(self.post(&body, true)).await?;

        let transformer = self.transformer.clone();
        let stream = response
            .bytes_stream()
            .eventsource()
            .flat_map(move |event| {
                let items: Vec<Result<ChatChunk>> = match event {
                    Ok(event) => match transformer.parse_stream_chunk(&event.data) {
                        Ok(chunks) => chunks.into_iter().map(Ok).collect(),
                        Err(e) => vec![Err(LLMError::Transform(e))],
                    },
                    Err(e) => vec![Err(LLMError::Stream(e.to_string()))],
                };
                stream::iter(items)
            });

        Ok(Box::pin(stream))
    }
}

/// Read at most `MAX_ERROR_BODY_READ` bytes of an error response.
async fn read_error_body(mut response: reqwest::Response) -> String {
    let mut body = Vec::new();
    while body.len() < MAX_ERROR_BODY_READ {
        match response.chunk().await {
            Ok(Some(chunk)) => body.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(e) => {
                log::debug!("Failed to read upstream error body: {}", e);
                break;
            }
        }
    }
    body.truncate(MAX_ERROR_BODY_READ);
    String::from_utf8_lossy(&body).into_owned()
}

/// Pull a readable message out of an upstream error body.
fn upstream_error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    if let Some(message) = parsed
        .as_ref()
        .and_then(|v| v["error"]["message"].as_str().or_else(|| v["error"].as_str()))
    {
        return message.to_string();
    }

    let body = body.trim();
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[async_trait]
impl<T: SchemaTransformer + 'static> LLMProvider for BaseProvider<T> {
    fn provider_id(&self) -> &str {
        self.provider_id()
    }

    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.send_request(request).await
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<LLMStream> {
        self.send_stream_request(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_openai_body() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(upstream_error_message(body), "Incorrect API key provided");
    }

    #[test]
    fn test_error_message_plain_text() {
        assert_eq!(upstream_error_message("  bad gateway \n"), "bad gateway");
    }

    #[test]
    fn test_error_message_truncated() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let message = upstream_error_message(&body);
        assert!(message.ends_with("..."));
        assert!(message.len() <= MAX_ERROR_BODY + 3);
    }
}
