//! Stub implementation for when the `local-playback` feature is disabled

/// No-op playback placeholder when the `local-playback` feature is disabled
#[derive(Debug, Default)]
pub struct LocalPlayback;

impl LocalPlayback {
    /// Create a disabled playback handle
    pub fn new() -> Self {
        Self
    }

    /// Discard the audio
    pub fn play(&self, _pcm: &[u8]) {}

    /// Never holds a device
    pub fn is_active(&self) -> bool {
        false
    }
}
