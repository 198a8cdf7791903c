use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use actix_web::http::header;
use actix_web::web::Bytes;
use actix_web::HttpResponse;
use chatrelay_core::ChatRequest;
use chatrelay_llm::LLMProvider;
use futures::{FutureExt, Stream};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn, Instrument};

use crate::relay::{self, RelayEvent, RelayState};
use crate::state::RelaySettings;

/// Start relaying `request` and return the SSE response right away.
///
/// The response body owns a drop guard for the relay's cancellation token;
/// when actix drops the body (client disconnect) the relay stops pulling.
/// A panic in the relay still ends the stream with an `error` event.
pub fn open_stream(
    llm: Arc<dyn LLMProvider>,
    request: ChatRequest,
    settings: RelaySettings,
) -> HttpResponse {
    // capacity 1: the relay never runs more than one event ahead of the client
    let (tx, rx) = mpsc::channel::<RelayEvent>(1);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let start = Instant::now();

    tokio::spawn(
        async move {
            let fallback = tx.clone();
            let relayed = AssertUnwindSafe(relay::run(llm, request, tx, cancel, settings.idle_timeout))
                .catch_unwind()
                .await;
            let elapsed = start.elapsed();

            let outcome = match relayed {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!(?elapsed, "Stream relay panicked");
                    let event = RelayEvent::error("internal_error", "stream relay failed");
                    if fallback.send(event).await.is_err() {
                        debug!("Client gone before the relay failure was reported");
                    }
                    return;
                }
            };

            match outcome.state {
                RelayState::Completed => {
                    info!(chunks = outcome.chunks, ?elapsed, "Stream completed")
                }
                RelayState::Errored => {
                    warn!(chunks = outcome.chunks, ?elapsed, "Stream ended with error")
                }
                RelayState::Cancelled => {
                    debug!(chunks = outcome.chunks, ?elapsed, "Stream cancelled by client")
                }
            }
        }
        .in_current_span(),
    );

    HttpResponse::Ok()
        .append_header((header::CONTENT_TYPE, "text/event-stream"))
        .append_header((header::CACHE_CONTROL, "no-cache"))
        .append_header((header::CONNECTION, "keep-alive"))
        .streaming(sse_body(rx, guard))
}

/// SSE body fed by the relay channel
fn sse_body(
    mut rx: mpsc::Receiver<RelayEvent>,
    guard: DropGuard,
) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
    async_stream::stream! {
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            yield Ok::<_, actix_web::Error>(event.to_sse());
        }
    }
}
