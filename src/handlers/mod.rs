//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `bridge` - Caller WebSocket bridged to the upstream realtime session

pub mod api;
pub mod bridge;

// Re-export commonly used handlers for convenient access
pub use bridge::bridge_handler;
