//! Microphone capture
//!
//! Pulls f32 PCM off a cpal input stream and hands it to the room layer as
//! [`AudioFrame`]s in ~20 ms batches.

use crate::error::MediaError;
use crate::frames::AudioFrame;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Samples per emitted frame, per channel (20 ms at 48 kHz)
const FRAME_SAMPLES: usize = 960;

/// Microphone capture configuration
#[derive(Debug, Clone)]
pub struct MicrophoneConfig {
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Requested channel count
    pub channels: u8,
    /// Device name (None for default input device)
    pub device_name: Option<String>,
}

impl Default for MicrophoneConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
            device_name: None,
        }
    }
}

/// Microphone capture over cpal
pub struct MicrophoneCapture {
    is_capturing: Arc<AtomicBool>,
}

impl MicrophoneCapture {
    /// Create a capture handle (no device is touched until `start`)
    pub fn new() -> Self {
        Self {
            is_capturing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start capturing; returns the receiver for captured frames
    pub fn start(
        &mut self,
        config: MicrophoneConfig,
    ) -> Result<mpsc::Receiver<AudioFrame>, MediaError> {
        if self.is_capturing.load(Ordering::Relaxed) {
            return Err(MediaError::InvalidState {
                message: "Already capturing".to_string(),
            });
        }

        let host = cpal::default_host();
        let device = if let Some(device_name) = &config.device_name {
            host.input_devices()
                .map_err(|e| MediaError::DeviceEnumerationFailed {
                    reason: e.to_string(),
                })?
                .find(|d| d.name().unwrap_or_default() == *device_name)
                .ok_or_else(|| MediaError::DeviceNotFound {
                    device_id: device_name.clone(),
                })?
        } else {
            host.default_input_device()
                .ok_or_else(|| MediaError::DeviceNotFound {
                    device_id: "default input device".to_string(),
                })?
        };

        info!(
            "Capturing microphone from {:?}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let stream_config = cpal::StreamConfig {
            channels: config.channels as cpal::ChannelCount,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (sender, receiver) = mpsc::channel::<AudioFrame>(32);
        let is_capturing = self.is_capturing.clone();
        let callback_capturing = is_capturing.clone();

        let sample_rate = config.sample_rate;
        let channels = config.channels;
        let batch = FRAME_SAMPLES * channels as usize;
        let mut pending: Vec<f32> = Vec::with_capacity(batch * 2);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !callback_capturing.load(Ordering::Relaxed) {
                        return;
                    }
                    pending.extend_from_slice(data);
                    while pending.len() >= batch {
                        let samples: Vec<f32> = pending.drain(..batch).collect();
                        let frame = AudioFrame {
                            samples,
                            sample_rate,
                            channels,
                            timestamp_ms: std::time::SystemTime::now()
                                .duration_since(std::time::UNIX_EPOCH)
                                .unwrap_or_default()
                                .as_millis() as u64,
                        };
                        // Audio callback must never block; drop when the
                        // consumer is behind.
                        if sender.try_send(frame).is_err() {
                            warn!("Microphone frame dropped, consumer behind");
                        }
                    }
                },
                move |err| {
                    warn!("Microphone stream error: {}", err);
                },
                None,
            )
            .map_err(|e| MediaError::Audio {
                message: format!("Failed to build input stream: {}", e),
            })?;

        stream.play().map_err(|e| MediaError::Audio {
            message: format!("Failed to start input stream: {}", e),
        })?;

        self.is_capturing.store(true, Ordering::Relaxed);

        // Keep stream alive
        std::mem::forget(stream);

        Ok(receiver)
    }

    /// Stop producing frames
    pub fn stop(&mut self) {
        self.is_capturing.store(false, Ordering::Relaxed);
    }

    /// Whether capture is live
    pub fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::Relaxed)
    }
}

impl Default for MicrophoneCapture {
    fn default() -> Self {
        Self::new()
    }
}
