//! Playback sinks for subscribed remote tracks
//!
//! Remote audio goes to the system output device through cpal; remote
//! video goes to whatever `VideoSink` the application attaches. The
//! default video sink just buffers the latest frames so a headless
//! consumer (or a test) can pull them.

use crate::error::MediaError;
use crate::frames::{AudioFrame, VideoFrame};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Frames of audio buffered ahead of the output callback
const AUDIO_BUFFER_DEPTH: usize = 10;

/// Audio playback configuration
#[derive(Debug, Clone)]
pub struct AudioSinkConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Number of output channels
    pub channels: u16,
    /// Output device name, `None` for the system default
    pub device_name: Option<String>,
}

impl Default for AudioSinkConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            device_name: None,
        }
    }
}

/// Audio playback sink backed by a cpal output stream
pub struct AudioSink {
    playing: Arc<AtomicBool>,
    buffer: Arc<Mutex<VecDeque<AudioFrame>>>,
}

impl std::fmt::Debug for AudioSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSink")
            .field("playing", &self.playing.load(Ordering::Relaxed))
            .finish()
    }
}

impl AudioSink {
    pub fn new() -> Self {
        Self {
            playing: Arc::new(AtomicBool::new(false)),
            buffer: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Start playback
    ///
    /// Returns the sender the session feeds decoded remote audio into.
    pub fn start(&mut self, config: AudioSinkConfig) -> Result<mpsc::Sender<AudioFrame>, MediaError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        if self.playing.load(Ordering::Relaxed) {
            return Err(MediaError::InvalidState {
                message: "Audio sink already playing".to_string(),
            });
        }

        let host = cpal::default_host();
        let device = if let Some(name) = &config.device_name {
            host.output_devices()
                .map_err(|e| MediaError::Audio {
                    message: format!("Failed to enumerate output devices: {}", e),
                })?
                .find(|d| d.name().map(|n| n == *name).unwrap_or(false))
                .ok_or_else(|| MediaError::DeviceNotFound {
                    device_id: name.clone(),
                })?
        } else {
            host.default_output_device()
                .ok_or_else(|| MediaError::DeviceNotFound {
                    device_id: "default output device".to_string(),
                })?
        };

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (sender, mut receiver) = mpsc::channel::<AudioFrame>(32);
        let playing = self.playing.clone();
        let buffer = self.buffer.clone();

        // Drain the channel into the playback buffer, newest frames win
        let fill_buffer = buffer.clone();
        let fill_playing = playing.clone();
        tokio::spawn(async move {
            while let Some(frame) = receiver.recv().await {
                if !fill_playing.load(Ordering::Relaxed) {
                    break;
                }
                let mut buffer = fill_buffer.lock();
                buffer.push_back(frame);
                while buffer.len() > AUDIO_BUFFER_DEPTH {
                    buffer.pop_front();
                }
            }
        });

        let out_channels = stream_config.channels;
        let out_rate = stream_config.sample_rate.0;
        let cb_playing = playing.clone();
        let cb_buffer = buffer.clone();
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !cb_playing.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    let frame = cb_buffer.lock().pop_front();
                    if let Some(frame) = frame {
                        let samples = convert_audio_format(
                            &frame.samples,
                            frame.channels,
                            frame.sample_rate,
                            out_channels,
                            out_rate,
                        );
                        let n = data.len().min(samples.len());
                        data[..n].copy_from_slice(&samples[..n]);
                        if n < data.len() {
                            data[n..].fill(0.0);
                        }
                    } else {
                        data.fill(0.0);
                    }
                },
                move |err| {
                    warn!("Audio sink stream error: {}", err);
                },
                None,
            )
            .map_err(|e| MediaError::Audio {
                message: format!("Failed to build output stream: {}", e),
            })?;

        stream.play().map_err(|e| MediaError::Audio {
            message: format!("Failed to start output stream: {}", e),
        })?;

        self.playing.store(true, Ordering::Relaxed);

        // Keep stream alive; playback is gated by the flag
        std::mem::forget(stream);

        info!(
            "Audio sink playing ({} Hz, {} ch)",
            config.sample_rate, config.channels
        );
        Ok(sender)
    }

    /// Stop playback and drop buffered audio
    pub fn stop(&mut self) {
        self.playing.store(false, Ordering::Relaxed);
        self.buffer.lock().clear();
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }
}

impl Default for AudioSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert between channel layouts and sample rates
///
/// Nearest-neighbor resampling, mono/stereo up and down mixing.
fn convert_audio_format(
    input: &[f32],
    input_channels: u8,
    input_sample_rate: u32,
    output_channels: u16,
    output_sample_rate: u32,
) -> Vec<f32> {
    let mut output: Vec<f32> = match (input_channels, output_channels) {
        (1, 2) => input.iter().flat_map(|&s| [s, s]).collect(),
        (2, 1) => input
            .chunks_exact(2)
            .map(|c| (c[0] + c[1]) * 0.5)
            .collect(),
        _ => input.to_vec(),
    };

    if input_sample_rate != output_sample_rate && input_sample_rate > 0 {
        let ratio = output_sample_rate as f32 / input_sample_rate as f32;
        let new_len = (output.len() as f32 * ratio) as usize;
        let mut resampled = Vec::with_capacity(new_len);
        for i in 0..new_len {
            let src = (i as f32 / ratio) as usize;
            resampled.push(output.get(src).copied().unwrap_or(0.0));
        }
        output = resampled;
    }

    output
}

/// Consumer of remote video frames
pub trait VideoSink: Send {
    /// Deliver one decoded frame
    fn render(&mut self, frame: VideoFrame) -> Result<(), MediaError>;
}

/// Default video sink that keeps the most recent frames in a queue
#[derive(Debug)]
pub struct BufferedVideoSink {
    frames: Arc<Mutex<VecDeque<VideoFrame>>>,
    capacity: usize,
    frames_received: u64,
}

impl BufferedVideoSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
            frames_received: 0,
        }
    }

    /// Pop the oldest buffered frame
    pub fn next_frame(&self) -> Option<VideoFrame> {
        self.frames.lock().pop_front()
    }

    /// Frames delivered so far
    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }
}

impl Default for BufferedVideoSink {
    fn default() -> Self {
        Self::new(4)
    }
}

impl VideoSink for BufferedVideoSink {
    fn render(&mut self, frame: VideoFrame) -> Result<(), MediaError> {
        let mut frames = self.frames.lock();
        frames.push_back(frame);
        while frames.len() > self.capacity {
            frames.pop_front();
        }
        self.frames_received += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_to_stereo_duplicates_samples() {
        let out = convert_audio_format(&[0.5, -0.5], 1, 48_000, 2, 48_000);
        assert_eq!(out, vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn stereo_to_mono_averages() {
        let out = convert_audio_format(&[1.0, 0.0, -1.0, -1.0], 2, 48_000, 1, 48_000);
        assert_eq!(out, vec![0.5, -1.0]);
    }

    #[test]
    fn resampling_changes_length() {
        let input = vec![0.0f32; 480];
        let out = convert_audio_format(&input, 1, 48_000, 1, 24_000);
        assert_eq!(out.len(), 240);
    }

    #[test]
    fn buffered_sink_caps_backlog() {
        let mut sink = BufferedVideoSink::new(2);
        for ts in 0..5u64 {
            let frame = VideoFrame::new(1, 1, vec![0u8; 4], ts).unwrap();
            sink.render(frame).unwrap();
        }
        assert_eq!(sink.frames_received(), 5);
        // Only the two newest remain
        assert_eq!(sink.next_frame().unwrap().timestamp_ms, 3);
        assert_eq!(sink.next_frame().unwrap().timestamp_ms, 4);
        assert!(sink.next_frame().is_none());
    }
}
