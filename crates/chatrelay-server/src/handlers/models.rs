use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use super::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub default: String,
    pub models: Vec<String>,
}

/// GET /api/models
///
/// With no allow-list configured, only the default model is advertised.
pub async fn list_models(state: web::Data<AppState>) -> impl Responder {
    let defaults = &state.defaults;
    let models = if defaults.allowed_models.is_empty() {
        vec![defaults.model.clone()]
    } else {
        defaults.allowed_models.clone()
    };

    HttpResponse::Ok().json(ApiResponse::ok(ModelList {
        default: defaults.model.clone(),
        models,
    }))
}
