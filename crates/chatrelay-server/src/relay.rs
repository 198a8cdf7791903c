//! Stream relay
//!
//! Pulls items from an upstream completion stream and pushes them, one at a
//! time and in order, to the outbound SSE channel. The loop stops on the first
//! terminal item, on the idle timeout, or as soon as the cancellation token
//! fires or the outbound side goes away. Returning drops the upstream stream,
//! which releases its HTTP connection.

use std::sync::Arc;
use std::time::Duration;

use actix_web::web::Bytes;
use chatrelay_core::chat::{ChatChunk, ChatRequest, ChatUsage, FinishReason};
use chatrelay_llm::{LLMError, LLMProvider, LLMStream};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::upstream_code;

/// One outbound SSE event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayEvent {
    Chunk {
        text: String,
    },
    Done {
        #[serde(rename = "finishReason")]
        finish_reason: FinishReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<ChatUsage>,
    },
    Error {
        code: &'static str,
        message: String,
    },
}

impl RelayEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::Chunk { text: text.into() }
    }

    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    pub fn from_upstream_error(err: &LLMError) -> Self {
        Self::error(upstream_code(err), err.to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            RelayEvent::Chunk { .. } => "chunk",
            RelayEvent::Done { .. } => "done",
            RelayEvent::Error { .. } => "error",
        }
    }

    /// `done` and `error` end the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RelayEvent::Chunk { .. })
    }

    /// Encode as `event: <type>\ndata: <json>\n\n`
    pub fn to_sse(&self) -> Bytes {
        let data = match serde_json::to_string(self) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to serialize relay event: {}", e);
                r#"{"type":"error","code":"internal_error","message":"event encoding failed"}"#
                    .to_string()
            }
        };
        Bytes::from(format!("event: {}\ndata: {}\n\n", self.event_name(), data))
    }
}

/// Terminal state of one relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Upstream finished and `done` was delivered
    Completed,
    /// An `error` event was delivered
    Errored,
    /// Client went away; nothing further was emitted
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    pub state: RelayState,
    /// Chunk events handed to the outbound channel
    pub chunks: usize,
}

impl RelayOutcome {
    fn new(state: RelayState, chunks: usize) -> Self {
        Self { state, chunks }
    }
}

/// Open the upstream stream and relay it.
///
/// A failure to open the stream is reported as a single `error` event.
pub async fn run(
    llm: Arc<dyn LLMProvider>,
    request: ChatRequest,
    sink: mpsc::Sender<RelayEvent>,
    cancel: CancellationToken,
    idle_timeout: Duration,
) -> RelayOutcome {
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return RelayOutcome::new(RelayState::Cancelled, 0),
        opened = llm.chat_stream(request) => opened,
    };

    match opened {
        Ok(upstream) => relay(upstream, sink, cancel, idle_timeout).await,
        Err(e) => {
            warn!("Upstream stream failed to open: {}", e);
            let event = RelayEvent::from_upstream_error(&e);
            match deliver(&sink, &cancel, event).await {
                true => RelayOutcome::new(RelayState::Errored, 0),
                false => RelayOutcome::new(RelayState::Cancelled, 0),
            }
        }
    }
}

/// Relay an open upstream stream until it ends, fails, or is cancelled
pub async fn relay(
    mut upstream: LLMStream,
    sink: mpsc::Sender<RelayEvent>,
    cancel: CancellationToken,
    idle_timeout: Duration,
) -> RelayOutcome {
    let mut chunks = 0;
    let mut finish_reason = FinishReason::default();
    let mut usage = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Relay cancelled after {} chunks", chunks);
                return RelayOutcome::new(RelayState::Cancelled, chunks);
            }
            next = tokio::time::timeout(idle_timeout, upstream.next()) => next,
        };

        let event = match next {
            Err(_) => {
                warn!("No upstream item within {:?}", idle_timeout);
                RelayEvent::error(
                    "upstream_timeout",
                    format!("no data from upstream within {}s", idle_timeout.as_secs()),
                )
            }
            Ok(None) | Ok(Some(Ok(ChatChunk::Done))) => RelayEvent::Done {
                finish_reason,
                usage,
            },
            Ok(Some(Ok(ChatChunk::Content { text }))) => {
                if text.is_empty() {
                    continue;
                }
                RelayEvent::chunk(text)
            }
            Ok(Some(Ok(ChatChunk::Finish { reason }))) => {
                finish_reason = reason;
                continue;
            }
            Ok(Some(Ok(ChatChunk::Usage(u)))) => {
                usage = Some(u);
                continue;
            }
            Ok(Some(Ok(ChatChunk::Error { message }))) => {
                warn!("Upstream reported an error mid-stream: {}", message);
                RelayEvent::error("upstream_error", message)
            }
            Ok(Some(Err(e))) => {
                warn!("Upstream stream failed: {}", e);
                RelayEvent::from_upstream_error(&e)
            }
        };

        let terminal = event.is_terminal();
        let completed = matches!(event, RelayEvent::Done { .. });

        if !deliver(&sink, &cancel, event).await {
            debug!("Client went away after {} chunks", chunks);
            return RelayOutcome::new(RelayState::Cancelled, chunks);
        }

        if !terminal {
            chunks += 1;
            continue;
        }
        let state = if completed {
            RelayState::Completed
        } else {
            RelayState::Errored
        };
        return RelayOutcome::new(state, chunks);
    }
}

/// Push one event, giving up if the client is gone
async fn deliver(
    sink: &mpsc::Sender<RelayEvent>,
    cancel: &CancellationToken,
    event: RelayEvent,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = sink.send(event) => sent.is_ok(),
    }
}
