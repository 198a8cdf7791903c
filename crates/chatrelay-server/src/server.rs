//! HTTP server: routes and listener

use actix_web::{error, middleware, web, App, HttpRequest, HttpServer};
use chatrelay_core::ValidationError;
use tracing::info;

use crate::error::ApiError;
use crate::handlers::{chat, health, models};
use crate::state::AppState;

/// Largest accepted request body
const MAX_PAYLOAD_SIZE: usize = 4 * 1024 * 1024;

/// Unparseable or mistyped JSON is a caller error
fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::from(ValidationError::Malformed(err.to_string())).into()
}

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_PAYLOAD_SIZE)
        .error_handler(json_error_handler)
}

/// Register all routes. Shared by the server and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/health", web::get().to(health::health))
        .service(
            web::scope("/api")
                .route("/chat", web::post().to(chat::chat))
                .route("/models", web::get().to(models::list_models)),
        );
}

pub async fn run_server(state: AppState, host: &str, port: u16) -> std::io::Result<()> {
    let data = web::Data::new(state);

    info!("Listening on http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind((host, port))?
    .run()
    .await
}
