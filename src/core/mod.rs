pub mod audio;
pub mod context;
pub mod realtime;

// Re-export commonly used types for convenience
pub use audio::{AudioSink, CallerFrame, LocalPlayback};
pub use context::{ContextStore, ScopeClassifier, retrieve};
pub use realtime::{
    InjectionMode, OpenAIRealtime, RealtimeConfig, RealtimeError, RealtimeResult,
    RealtimeUpstream, SessionState, StatsSnapshot,
};
