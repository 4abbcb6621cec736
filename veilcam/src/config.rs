//! Configuration types and defaults

use std::path::PathBuf;
use veilcam_core::VeilError;
use veilcam_media::{CameraConfig, MicrophoneConfig};

/// Global veilcam configuration
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    /// Enable debug logging
    pub debug_logging: bool,
    /// Default room service URL, used when the builder gets none
    pub default_service_url: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            default_service_url: None,
        }
    }
}

/// Room-specific configuration
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Publish the processed camera track
    pub video_enabled: bool,
    /// Publish the microphone track
    pub audio_enabled: bool,
    /// Maximum participants before the client refuses the room
    pub max_participants: usize,
    /// Processing width the matting pipeline runs at
    pub processing_width: u32,
    /// Processing height the matting pipeline runs at
    pub processing_height: u32,
    /// Target framerate of the processed stream
    pub framerate: f64,
    /// Path to the segmentation model file
    pub model_path: Option<PathBuf>,
    /// Path to the background image
    pub background_path: Option<PathBuf>,
    /// Camera capture settings
    pub camera: CameraConfig,
    /// Microphone capture settings
    pub microphone: MicrophoneConfig,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            video_enabled: true,
            audio_enabled: true,
            max_participants: 2,
            processing_width: 480,
            processing_height: 320,
            framerate: 30.0,
            model_path: None,
            background_path: None,
            camera: CameraConfig::default(),
            microphone: MicrophoneConfig::default(),
        }
    }
}

impl RoomConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), VeilError> {
        if self.max_participants == 0 {
            return Err(VeilError::MissingConfiguration {
                field: "max_participants".to_string(),
            });
        }
        if self.processing_width == 0 || self.processing_height == 0 {
            return Err(VeilError::MissingConfiguration {
                field: "processing resolution".to_string(),
            });
        }
        if self.framerate <= 0.0 {
            return Err(VeilError::MissingConfiguration {
                field: "framerate".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_room_holds_two() {
        let config = RoomConfig::default();
        assert_eq!(config.max_participants, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = RoomConfig {
            max_participants: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
