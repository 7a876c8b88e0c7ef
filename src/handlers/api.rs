use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// Health check response body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub upstream_model: String,
    pub context_loaded: bool,
}

/// Health check handler
///
/// Always reports `ok` while the process serves requests; `context_loaded`
/// tells whether a real background document (not the placeholder) is in use.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        upstream_model: state.config.model.clone(),
        context_loaded: state.context.has_full_document(),
    })
}
