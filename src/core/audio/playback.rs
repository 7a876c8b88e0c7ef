//! Local playback of synthesized audio via cpal.
//!
//! The output device is opened on a blocking thread when the first chunk
//! arrives and released when the owning [`LocalPlayback`] is dropped. Chunks
//! that arrive while the device is still opening are dropped. Every failure
//! is swallowed after being logged once: playback is a debugging aid, never
//! part of the call.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;

use super::{PLAYBACK_CHANNELS, PLAYBACK_SAMPLE_RATE};

/// Upper bound on queued samples (about five seconds at 48 kHz stereo).
const MAX_QUEUED_SAMPLES: usize = 48_000 * 2 * 5;

/// Wrapper so a `cpal::Stream` can live inside a `Send + Sync` owner.
struct SendStream(#[allow(dead_code)] cpal::Stream);

// SAFETY: the stream handle is only stored to keep the device alive and then
// dropped; cpal runs the output callback on its own thread and the callback
// shares nothing with the handle except the mutex-protected sample queue.
unsafe impl Send for SendStream {}
unsafe impl Sync for SendStream {}

/// An opened output device.
struct PlaybackDevice {
    _stream: SendStream,
    queue: Arc<Mutex<VecDeque<f32>>>,
    device_rate: u32,
    device_channels: u16,
}

impl PlaybackDevice {
    fn open() -> Result<Self, String> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| "No default output device found".to_string())?;

        let supported = device
            .default_output_config()
            .map_err(|e| format!("Failed to query output config: {e}"))?;

        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let queue = Arc::new(Mutex::new(VecDeque::<f32>::new()));
        let callback_queue = Arc::clone(&queue);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queue = callback_queue.lock();
                    for sample in data.iter_mut() {
                        *sample = queue.pop_front().unwrap_or(0.0);
                    }
                },
                |err| tracing::debug!("Playback stream error: {}", err),
                None,
            )
            .map_err(|e| format!("Failed to build output stream: {e}"))?;

        stream
            .play()
            .map_err(|e| format!("Failed to start output stream: {e}"))?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!(
            device = %device_name,
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "Local playback started"
        );

        Ok(Self {
            _stream: SendStream(stream),
            queue,
            device_rate: config.sample_rate.0,
            device_channels: config.channels,
        })
    }

    fn enqueue(&self, pcm: &[u8]) {
        let mono = pcm16_to_f32(pcm);
        let resampled = resample_linear(&mono, PLAYBACK_SAMPLE_RATE, self.device_rate);

        let mut queue = self.queue.lock();
        for sample in resampled {
            for _ in 0..self.device_channels.max(PLAYBACK_CHANNELS) {
                queue.push_back(sample);
            }
        }
        if queue.len() > MAX_QUEUED_SAMPLES {
            let excess = queue.len() - MAX_QUEUED_SAMPLES;
            queue.drain(..excess);
        }
    }
}

#[derive(Default)]
struct PlaybackShared {
    device: Mutex<Option<PlaybackDevice>>,
    opening: AtomicBool,
    unavailable: AtomicBool,
}

impl PlaybackShared {
    fn open_device(&self) {
        match PlaybackDevice::open() {
            Ok(opened) => *self.device.lock() = Some(opened),
            Err(e) => {
                tracing::debug!("Local playback unavailable: {}", e);
                self.unavailable.store(true, Ordering::Release);
            }
        }
        self.opening.store(false, Ordering::Release);
    }
}

/// Best-effort local playback owned by a single session's audio sink.
pub struct LocalPlayback {
    shared: Arc<PlaybackShared>,
}

impl LocalPlayback {
    /// Create an idle playback handle; the device is opened on first use.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(PlaybackShared::default()),
        }
    }

    /// Queue PCM16 mono 16 kHz audio for playback. Never fails or blocks.
    pub fn play(&self, pcm: &[u8]) {
        if self.shared.unavailable.load(Ordering::Acquire) || pcm.len() < 2 {
            return;
        }

        if let Some(device) = self.shared.device.lock().as_ref() {
            device.enqueue(pcm);
            return;
        }

        if !self.shared.opening.swap(true, Ordering::AcqRel) {
            self.start_open();
        }
    }

    /// Open the device off the async workers; device probing can take a while.
    fn start_open(&self) {
        let shared = Arc::clone(&self.shared);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || shared.open_device());
            }
            Err(_) => shared.open_device(),
        }
    }

    /// Whether an output device is currently held.
    pub fn is_active(&self) -> bool {
        self.shared.device.lock().is_some()
    }

    #[cfg(test)]
    fn is_opening(&self) -> bool {
        self.shared.opening.load(Ordering::Acquire)
    }
}

impl Default for LocalPlayback {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LocalPlayback {
    fn drop(&mut self) {
        if self.shared.device.lock().take().is_some() {
            tracing::debug!("Local playback released");
        }
    }
}

/// Decode little-endian PCM16 into f32 samples; a trailing odd byte is ignored.
fn pcm16_to_f32(pcm: &[u8]) -> Vec<f32> {
    pcm.chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / i16::MAX as f32)
        .collect()
}

/// Linear-interpolation resampler.
fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == to_rate || to_rate == 0 {
        return input.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (input.len() as f64 / ratio).ceil() as usize;
    let last = input.len() - 1;

    (0..out_len)
        .map(|i| {
            let src = i as f64 * ratio;
            let idx0 = (src.floor() as usize).min(last);
            let idx1 = (idx0 + 1).min(last);
            let frac = (src - idx0 as f64) as f32;
            input[idx0] * (1.0 - frac) + input[idx1] * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_decode() {
        let samples = pcm16_to_f32(&[0x00, 0x00, 0xff, 0x7f, 0x01]);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_resample_doubles_length() {
        let out = resample_linear(&[0.0, 1.0], 16_000, 32_000);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_first_chunk_does_not_wait_for_device() {
        let playback = LocalPlayback::new();

        playback.play(&[0, 0, 1, 0]);

        // the open finishes on a blocking thread, with or without a device
        let settled = tokio::time::timeout(std::time::Duration::from_secs(10), async {
            while playback.is_opening() {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(settled.is_ok());
        assert!(playback.is_active() || playback.shared.unavailable.load(Ordering::Acquire));

        // a later chunk never reopens the device
        playback.play(&[0, 0]);
        assert!(!playback.is_opening());
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let input = vec![0.1, -0.2, 0.3];
        assert_eq!(resample_linear(&input, 16_000, 16_000), input);
    }
}
