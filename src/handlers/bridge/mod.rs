//! Caller-facing bridge WebSocket
//!
//! # Protocol
//!
//! ## Caller → Server
//!
//! - **Binary frames**: caller audio (PCM 16-bit, 16kHz, mono), relayed upstream as-is
//! - **Text frames**: inspected for JSON signaling with an `event` field
//!   (`start`, `stop`, `mark`, `incoming_call`, ...); `stop` ends the session.
//!   Text is never relayed upstream.
//!
//! ## Server → Caller
//!
//! - **Binary frames**: synthesized audio (PCM 16-bit, 16kHz, mono)
//! - **Close**: sent once when the session ends, including when the upstream
//!   could not be reached

mod handler;
pub mod messages;
pub mod session;

pub use handler::bridge_handler;
pub use messages::{InboundFrame, SignalingEvent};
pub use session::{SessionOutcome, run_bridge_session};
