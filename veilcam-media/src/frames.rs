//! Media frame types
//!
//! All video in this crate is RGBA8: the camera decodes into it, the
//! matting output is composited into it, and the published payload is it.

/// Audio frame representation
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Audio samples (f32 PCM data, interleaved)
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u8,
    /// Timestamp in milliseconds
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration this frame covers
    pub fn duration(&self) -> std::time::Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return std::time::Duration::ZERO;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        std::time::Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    /// Encode samples as little-endian bytes for the wire
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 4);
        for sample in &self.samples {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }

    /// Decode little-endian sample bytes from the wire
    pub fn samples_from_le_bytes(data: &[u8]) -> Vec<f32> {
        data.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

/// Video frame representation (always RGBA8)
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// RGBA8 pixel data, row-major
    pub data: Vec<u8>,
    /// Timestamp in milliseconds
    pub timestamp_ms: u64,
}

impl VideoFrame {
    /// Create a frame, checking that the buffer matches the dimensions
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_ms: u64,
    ) -> Result<Self, crate::MediaError> {
        let expected = (width * height * 4) as usize;
        if data.len() != expected {
            return Err(crate::MediaError::InvalidFrameData {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            timestamp_ms,
        })
    }

    /// Number of pixels in the frame
    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }
}

/// Media frame types
#[derive(Debug, Clone)]
pub enum MediaFrame {
    /// Audio frame
    Audio(AudioFrame),
    /// Video frame
    Video(VideoFrame),
}

impl MediaFrame {
    /// Timestamp of the frame in milliseconds
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            MediaFrame::Audio(f) => f.timestamp_ms,
            MediaFrame::Video(f) => f.timestamp_ms,
        }
    }
}
