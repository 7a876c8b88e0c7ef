//! Bridge WebSocket handler
//!
//! Accepts a caller connection, wires it to a fresh upstream session and runs
//! the session inside its own tracing span.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};

use super::messages::InboundFrame;
use super::session::run_bridge_session;
use crate::core::audio::{AudioSink, CallerFrame, LocalPlayback};
use crate::core::realtime::OpenAIRealtime;
use crate::state::AppState;

/// Queue depth between the session and the caller writer task
const CALLER_CHANNEL_CAPACITY: usize = 1024;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Bridge WebSocket handler
///
/// Upgrades the HTTP connection and bridges it to one upstream realtime
/// session. Binary frames are caller audio; text frames are signaling.
pub async fn bridge_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    debug!(%peer, "Bridge WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| {
            let id = uuid::Uuid::new_v4().to_string();
            let span = info_span!("bridge_session", %id, %peer);
            handle_bridge_socket(socket, state, id).instrument(span)
        })
}

/// Run one bridge session over an accepted caller socket.
async fn handle_bridge_socket(socket: WebSocket, state: Arc<AppState>, id: String) {
    info!("Caller connected");

    let (mut ws_sender, ws_receiver) = socket.split();
    let (caller_tx, mut caller_rx) = mpsc::channel::<CallerFrame>(CALLER_CHANNEL_CAPACITY);

    // single writer for the caller socket
    let writer = tokio::spawn(
        async move {
            while let Some(frame) = caller_rx.recv().await {
                match frame {
                    CallerFrame::Audio(data) => {
                        if let Err(e) = ws_sender.send(Message::Binary(data)).await {
                            warn!("Failed to send audio to caller: {}", e);
                            break;
                        }
                    }
                    CallerFrame::Close => {
                        if let Err(e) = ws_sender.send(Message::Close(None)).await {
                            debug!("Caller close frame not sent: {}", e);
                        }
                        break;
                    }
                }
            }
        }
        .in_current_span(),
    );

    let mut sink = AudioSink::new(caller_tx);
    if state.config.local_playback {
        sink = sink.with_playback(LocalPlayback::new());
    }

    let upstream = Arc::new(
        OpenAIRealtime::new(
            state.config.realtime_config(),
            Arc::clone(&state.context),
            sink.clone(),
        )
        .with_classifier(state.classifier.clone())
        .with_label(id),
    );

    let inbound = ws_receiver.filter_map(|message| async move {
        match message {
            Ok(Message::Binary(data)) => Some(InboundFrame::Audio(data)),
            Ok(Message::Text(text)) => Some(InboundFrame::Text(text.as_str().to_owned())),
            Ok(Message::Close(frame)) => {
                debug!(frame = ?frame, "Caller sent close frame");
                Some(InboundFrame::Close)
            }
            // axum answers pings itself
            Ok(Message::Ping(_) | Message::Pong(_)) => None,
            Err(e) => {
                warn!("Caller WebSocket error: {}", e);
                Some(InboundFrame::Close)
            }
        }
    });

    let outcome = run_bridge_session(upstream, inbound, sink).await;

    if let Err(e) = writer.await {
        warn!("Caller writer task failed: {}", e);
    }

    if outcome.is_error() {
        warn!(outcome = ?outcome, "Caller disconnected after session error");
    } else {
        info!("Caller disconnected");
    }
}
