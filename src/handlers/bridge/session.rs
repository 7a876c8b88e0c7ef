//! Per-call orchestration between the caller connection and the upstream.
//!
//! The orchestrator owns two loops: the inbound pump running here, and the
//! upstream event loop spawned as a task. Whichever ends first triggers the
//! same teardown: stop and await the event loop, close the upstream, then ask
//! the caller writer to close the caller connection.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::select;
use tracing::{Instrument, debug, info, warn};

use super::messages::{InboundFrame, SignalingEvent};
use crate::core::audio::AudioSink;
use crate::core::realtime::{ErrorClass, RealtimeError, RealtimeUpstream};

/// Why a bridge session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// `connect()` failed; nothing was relayed
    ConnectFailed(RealtimeError),
    /// The caller closed the connection
    CallerClosed,
    /// The caller sent a `stop` signaling event
    CallerStopped,
    /// Relaying a caller frame failed
    SendFailed(RealtimeError),
    /// The upstream closed the conversation
    UpstreamEnded,
    /// The upstream event loop failed
    UpstreamFailed(RealtimeError),
}

impl SessionOutcome {
    /// Whether the session ended because of an error.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed(_) | Self::SendFailed(_) | Self::UpstreamFailed(_)
        )
    }

    /// Class of the error that ended the session, if any.
    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            Self::ConnectFailed(e) | Self::SendFailed(e) | Self::UpstreamFailed(e) => Some(e.class()),
            Self::CallerClosed | Self::CallerStopped | Self::UpstreamEnded => None,
        }
    }
}

/// Drive one bridge session to completion.
///
/// `inbound` yields the caller's frames; `sink` is the same sink the upstream
/// delivers synthesized audio to and is closed on every exit path.
pub async fn run_bridge_session<U, S>(upstream: Arc<U>, inbound: S, sink: AudioSink) -> SessionOutcome
where
    U: RealtimeUpstream,
    S: Stream<Item = InboundFrame> + Send,
{
    if let Err(e) = upstream.connect().await {
        warn!(error = %e, class = ?e.class(), "Upstream connect failed, closing caller connection");
        sink.close().await;
        return SessionOutcome::ConnectFailed(e);
    }

    let mut events = {
        let upstream = Arc::clone(&upstream);
        tokio::spawn(async move { upstream.receive_events().await }.in_current_span())
    };
    let mut events_finished = false;

    let mut inbound = std::pin::pin!(inbound);

    let outcome = loop {
        select! {
            frame = inbound.next() => match frame {
                Some(InboundFrame::Audio(data)) => {
                    if let Err(e) = upstream.send_audio(data).await {
                        if e.is_fatal() {
                            warn!(error = %e, class = ?e.class(), "Failed to relay caller audio");
                            break SessionOutcome::SendFailed(e);
                        }
                        debug!(error = %e, "Dropping caller frame");
                    }
                }
                Some(InboundFrame::Text(text)) => {
                    if handle_signaling(&text) {
                        break SessionOutcome::CallerStopped;
                    }
                }
                Some(InboundFrame::Close) | None => {
                    info!("Caller connection closed");
                    break SessionOutcome::CallerClosed;
                }
            },
            result = &mut events, if !events_finished => {
                events_finished = true;
                break match result {
                    Ok(Ok(())) => SessionOutcome::UpstreamEnded,
                    Ok(Err(e)) => SessionOutcome::UpstreamFailed(e),
                    Err(e) => SessionOutcome::UpstreamFailed(RealtimeError::InvalidState(
                        format!("Upstream event task failed: {e}"),
                    )),
                };
            }
        }
    };

    // event loop first, then the upstream socket, then the caller
    if !events_finished {
        upstream.cancel();
        match events.await {
            Ok(Ok(())) => debug!("Upstream event loop stopped"),
            Ok(Err(e)) => debug!(error = %e, "Upstream event loop ended with error during teardown"),
            Err(e) => warn!(error = %e, "Upstream event task failed during teardown"),
        }
    }

    if let Err(e) = upstream.close().await {
        warn!(error = %e, "Failed to close upstream session");
    }
    sink.close().await;

    info!(
        outcome = ?outcome,
        error_class = ?outcome.error_class(),
        stats = ?upstream.stats(),
        delivered_bytes = sink.delivered_bytes(),
        "Bridge session finished"
    );
    outcome
}

/// Inspect a caller text frame. Returns true when it ends the session.
fn handle_signaling(text: &str) -> bool {
    let Some(event) = SignalingEvent::parse(text) else {
        debug!(bytes = text.len(), "Ignoring non-signaling text frame");
        return false;
    };

    match &event {
        SignalingEvent::Start { stream_sid } => {
            info!(stream_sid = stream_sid.as_deref().unwrap_or("unknown"), "Media stream started");
        }
        SignalingEvent::Stop => info!("Media stream stopped by caller"),
        SignalingEvent::IncomingCall => info!("Incoming call signaled"),
        SignalingEvent::Mark { mark } => {
            debug!(mark = ?mark.as_ref().and_then(|m| m.name.as_deref()), "Mark received");
        }
        SignalingEvent::Connected | SignalingEvent::Media | SignalingEvent::Other => {
            debug!(event = ?event, "Signaling event ignored");
        }
    }

    event.ends_session()
}
