use actix_web::{HttpResponse, Responder};
use serde_json::json;

/// GET /health
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
