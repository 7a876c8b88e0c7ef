pub mod api;
pub mod bridge;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Assemble the full application router.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api::create_api_router())
        .merge(bridge::create_bridge_router())
        .with_state(state)
}
