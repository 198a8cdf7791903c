//! Upstream doubles shared by the relay and SSE tests

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chatrelay_core::chat::{ChatChunk, ChatRequest, ChatResponse};
use chatrelay_core::types::ChatMessage;
use chatrelay_llm::{LLMError, LLMProvider, LLMStream, ProviderMetadata};
use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};

type OpenFn = Box<dyn Fn() -> BoxFuture<'static, chatrelay_llm::Result<LLMStream>> + Send + Sync>;

/// Provider whose `chat_stream` runs a caller-supplied opener
pub(crate) struct StubProvider {
    metadata: ProviderMetadata,
    open: OpenFn,
    calls: AtomicUsize,
}

impl StubProvider {
    pub(crate) fn new<F, Fut>(open: F) -> Arc<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = chatrelay_llm::Result<LLMStream>> + Send + 'static,
    {
        Arc::new(Self {
            metadata: ProviderMetadata {
                id: "stub".to_string(),
                name: "Stub".to_string(),
            },
            open: Box::new(move || open().boxed()),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMProvider for StubProvider {
    fn provider_id(&self) -> &str {
        &self.metadata.id
    }

    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn chat(&self, _request: ChatRequest) -> chatrelay_llm::Result<ChatResponse> {
        Err(LLMError::Config("stub only streams".to_string()))
    }

    async fn chat_stream(&self, _request: ChatRequest) -> chatrelay_llm::Result<LLMStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.open)().await
    }
}

pub(crate) fn stream_request() -> ChatRequest {
    ChatRequest::new("gpt-4o-mini")
        .with_message(ChatMessage::user("Hello"))
        .stream()
}

/// Sets its flag when the upstream stream holding it is dropped
pub(crate) struct DropFlag(pub(crate) Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Yields `items`, then never ends. Counts pulled items.
pub(crate) fn endless(
    items: Vec<chatrelay_llm::Result<ChatChunk>>,
    pulled: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
) -> LLMStream {
    let flag = DropFlag(dropped);
    Box::pin(
        stream::iter(items)
            .chain(stream::pending())
            .map(move |item| {
                let _held = &flag;
                pulled.fetch_add(1, Ordering::SeqCst);
                item
            }),
    )
}

/// Yields content chunks for as long as it is polled. Counts pulled items.
pub(crate) fn unbounded(pulled: Arc<AtomicUsize>, dropped: Arc<AtomicBool>) -> LLMStream {
    let flag = DropFlag(dropped);
    Box::pin(stream::repeat_with(move || {
        let _held = &flag;
        pulled.fetch_add(1, Ordering::SeqCst);
        Ok(ChatChunk::content("tick"))
    }))
}
