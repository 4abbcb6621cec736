//! Camera capture
//!
//! Capture runs through a small backend trait so the pipeline and the
//! tests do not depend on hardware. The real backend sits on nokhwa; the
//! test-pattern backend synthesizes frames.

use crate::error::MediaError;
use crate::frames::VideoFrame;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Camera capture configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Requested frame width
    pub width: u32,
    /// Requested frame height
    pub height: u32,
    /// Requested framerate
    pub framerate: f64,
    /// Device index (None for the default camera)
    pub device_index: Option<u32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 320,
            framerate: 30.0,
            device_index: None,
        }
    }
}

impl CameraConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), MediaError> {
        if self.width == 0 || self.height == 0 {
            return Err(MediaError::InvalidConfiguration {
                message: "Invalid resolution".to_string(),
            });
        }
        if self.framerate <= 0.0 || self.framerate > 120.0 {
            return Err(MediaError::InvalidConfiguration {
                message: "Invalid framerate".to_string(),
            });
        }
        Ok(())
    }
}

/// Camera device information
#[derive(Debug, Clone)]
pub struct CameraDevice {
    /// Device index
    pub index: u32,
    /// Human-readable device name
    pub name: String,
    /// Device description
    pub description: String,
}

/// Camera capture backend
pub trait CameraBackend: Send {
    /// Open the device described by the config
    fn open(&mut self, config: &CameraConfig) -> Result<(), MediaError>;
    /// Start streaming
    fn start(&mut self) -> Result<(), MediaError>;
    /// Block for the next frame (RGBA8)
    fn next_frame(&mut self) -> Result<VideoFrame, MediaError>;
    /// Stop streaming
    fn stop(&mut self) -> Result<(), MediaError>;
    /// Whether the stream is live
    fn is_streaming(&self) -> bool;
}

/// Enumerate cameras available on this machine
pub fn enumerate_cameras() -> Result<Vec<CameraDevice>, MediaError> {
    let cameras = nokhwa::query(nokhwa::utils::ApiBackend::Auto).map_err(|e| {
        MediaError::DeviceEnumerationFailed {
            reason: e.to_string(),
        }
    })?;

    Ok(cameras
        .into_iter()
        .enumerate()
        .map(|(i, info)| CameraDevice {
            index: i as u32,
            name: info.human_name(),
            description: info.description().to_string(),
        })
        .collect())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Real camera backend on top of nokhwa
pub struct NokhwaCamera {
    camera: Option<nokhwa::Camera>,
    streaming: bool,
}

impl NokhwaCamera {
    /// Create an unopened camera backend
    pub fn new() -> Self {
        Self {
            camera: None,
            streaming: false,
        }
    }
}

impl Default for NokhwaCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for NokhwaCamera {
    fn open(&mut self, config: &CameraConfig) -> Result<(), MediaError> {
        config.validate()?;

        use nokhwa::pixel_format::RgbAFormat;
        use nokhwa::utils::{
            CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
            Resolution,
        };

        let index = CameraIndex::Index(config.device_index.unwrap_or(0));
        let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(config.width, config.height),
                FrameFormat::MJPEG,
                config.framerate as u32,
            ),
        ));

        let camera = nokhwa::Camera::new(index, requested).map_err(|e| {
            MediaError::DeviceNotFound {
                device_id: format!("camera {}: {}", config.device_index.unwrap_or(0), e),
            }
        })?;

        info!(
            "Opened camera, negotiated format {:?}",
            camera.camera_format()
        );
        self.camera = Some(camera);
        Ok(())
    }

    fn start(&mut self) -> Result<(), MediaError> {
        let camera = self.camera.as_mut().ok_or(MediaError::CaptureNotActive)?;
        camera
            .open_stream()
            .map_err(|e| MediaError::InvalidState {
                message: format!("open_stream failed: {}", e),
            })?;
        self.streaming = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<VideoFrame, MediaError> {
        if !self.streaming {
            return Err(MediaError::CaptureNotActive);
        }
        let camera = self.camera.as_mut().ok_or(MediaError::CaptureNotActive)?;

        use nokhwa::pixel_format::RgbAFormat;
        let buffer = camera.frame().map_err(|e| MediaError::InvalidState {
            message: format!("frame capture failed: {}", e),
        })?;
        let decoded = buffer
            .decode_image::<RgbAFormat>()
            .map_err(|e| MediaError::InvalidState {
                message: format!("frame decode failed: {}", e),
            })?;

        let (width, height) = (decoded.width(), decoded.height());
        VideoFrame::new(width, height, decoded.into_raw(), now_ms())
    }

    fn stop(&mut self) -> Result<(), MediaError> {
        if let Some(camera) = self.camera.as_mut() {
            let _ = camera.stop_stream();
        }
        self.streaming = false;
        debug!("Camera stream stopped");
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }
}

/// Synthetic camera backend for tests and machines without a camera
///
/// Produces a moving two-tone pattern: the left half of each frame is
/// "foreground" colored, the rest "background" colored, shifting one column
/// per frame.
pub struct TestPatternCamera {
    config: CameraConfig,
    streaming: bool,
    frame_counter: u64,
}

impl TestPatternCamera {
    /// Create a test-pattern backend
    pub fn new() -> Self {
        Self {
            config: CameraConfig::default(),
            streaming: false,
            frame_counter: 0,
        }
    }
}

impl Default for TestPatternCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for TestPatternCamera {
    fn open(&mut self, config: &CameraConfig) -> Result<(), MediaError> {
        config.validate()?;
        self.config = config.clone();
        Ok(())
    }

    fn start(&mut self) -> Result<(), MediaError> {
        self.streaming = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<VideoFrame, MediaError> {
        if !self.streaming {
            return Err(MediaError::CaptureNotActive);
        }
        let (w, h) = (self.config.width, self.config.height);
        let split = ((self.frame_counter % w as u64) as u32).max(w / 2);
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for _y in 0..h {
            for x in 0..w {
                if x < split {
                    data.extend_from_slice(&[0, 200, 0, 255]);
                } else {
                    data.extend_from_slice(&[40, 40, 40, 255]);
                }
            }
        }
        self.frame_counter += 1;
        VideoFrame::new(w, h, data, now_ms())
    }

    fn stop(&mut self) -> Result<(), MediaError> {
        self.streaming = false;
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }
}
