//! Bridge WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::bridge_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the bridge WebSocket router
///
/// # Endpoints
///
/// - `GET /` - WebSocket upgrade for a bridged call
/// - `GET /bridge` - Same, for deployments that reserve `/`
///
/// # Protocol
///
/// The caller streams binary PCM16 frames (16kHz, mono) and receives the
/// assistant's audio the same way. Text frames carry telephony signaling
/// such as `{"event":"stop"}`.
pub fn create_bridge_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(bridge_handler))
        .route("/bridge", get(bridge_handler))
        .layer(TraceLayer::new_for_http())
}
