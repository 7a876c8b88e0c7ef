//! Audio delivery for synthesized speech.
//!
//! Audio is PCM 16-bit signed little-endian, mono, 16 kHz, carried as raw
//! bytes in both directions with no transcoding.
//!
//! Local playback is only compiled with the `local-playback` feature; without
//! it a no-op stand-in keeps the same API.

mod sink;

#[cfg(feature = "local-playback")]
mod playback;
#[cfg(not(feature = "local-playback"))]
mod stub;

#[cfg(feature = "local-playback")]
pub use playback::LocalPlayback;
#[cfg(not(feature = "local-playback"))]
pub use stub::LocalPlayback;

pub use sink::{AudioSink, CallerFrame};

/// Sample rate of bridged audio.
pub const PLAYBACK_SAMPLE_RATE: u32 = 16_000;

/// Channel count of bridged audio.
pub const PLAYBACK_CHANNELS: u16 = 1;

/// Whether this build can play audio on the host.
pub fn local_playback_supported() -> bool {
    cfg!(feature = "local-playback")
}
