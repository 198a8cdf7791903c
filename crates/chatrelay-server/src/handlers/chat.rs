use actix_web::{web, HttpResponse};
use chatrelay_core::{ChatMessage, ChatOptions};
use serde::Deserialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{stream, ApiResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// Body of `POST /api/chat`
#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub options: Option<ChatOptions>,
}

/// POST /api/chat
///
/// Returns one JSON result, one JSON error, or an SSE stream when
/// `options.stream` is set.
pub async fn chat(
    state: web::Data<AppState>,
    payload: web::Json<ChatPayload>,
) -> Result<HttpResponse, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("chat", %request_id);

    async move {
        let ChatPayload { messages, options } = payload.into_inner();

        let request = state
            .defaults
            .resolve(messages, options.unwrap_or_default())
            .map_err(|e| {
                debug!("Rejected chat request: {}", e);
                e
            })?;

        info!(
            model = %request.model,
            messages = request.messages.len(),
            stream = request.stream,
            "Chat request"
        );

        if request.stream {
            return Ok(stream::open_stream(state.llm.clone(), request, state.relay));
        }

        let response = state.llm.chat(request).await.map_err(|e| {
            warn!("Upstream chat failed: {}", e);
            e
        })?;

        debug!(
            usage = response.usage.total_tokens,
            finish_reason = %response.finish_reason,
            "Chat completed"
        );

        Ok(HttpResponse::Ok().json(ApiResponse::ok(response)))
    }
    .instrument(span)
    .await
}
