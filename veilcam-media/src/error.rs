//! Media processing error types and handling

use thiserror::Error;

/// Main error type for media operations
#[derive(Error, Debug)]
pub enum MediaError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// Device enumeration failed
    #[error("Device enumeration failed: {reason}")]
    DeviceEnumerationFailed {
        /// Failure reason
        reason: String,
    },

    /// Device not found error
    #[error("Device not found: {device_id}")]
    DeviceNotFound {
        /// Device identifier
        device_id: String,
    },

    /// Capture not active error
    #[error("Capture not active")]
    CaptureNotActive,

    /// Invalid frame data error
    #[error("Invalid frame data: expected {expected} bytes, got {actual}")]
    InvalidFrameData {
        /// Expected data size
        expected: usize,
        /// Actual data size
        actual: usize,
    },

    /// Frame dimensions do not match what the operation requires
    #[error("Dimension mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    DimensionMismatch {
        /// Expected width
        expected_width: u32,
        /// Expected height
        expected_height: u32,
        /// Actual width
        actual_width: u32,
        /// Actual height
        actual_height: u32,
    },

    /// Matting model failure
    #[error("Matting model error: {reason}")]
    Matting {
        /// Failure reason
        reason: String,
    },

    /// Model file missing or unloadable
    #[error("Model load failed for {path}: {reason}")]
    ModelLoadFailed {
        /// Model path
        path: String,
        /// Failure reason
        reason: String,
    },

    /// Background image failure
    #[error("Background image error: {reason}")]
    Background {
        /// Failure reason
        reason: String,
    },

    /// Audio specific errors
    #[error("Audio error: {message}")]
    Audio {
        /// Error message
        message: String,
    },

    /// Invalid state for operation
    #[error("Invalid state: {message}")]
    InvalidState {
        /// State error message
        message: String,
    },
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::Io { .. } => true,
            MediaError::Audio { .. } => true,
            MediaError::Matting { .. } => true,
            MediaError::InvalidConfiguration { .. } => false,
            MediaError::ModelLoadFailed { .. } => false,
            MediaError::DeviceNotFound { .. } => false,
            MediaError::DimensionMismatch { .. } => false,
            _ => false,
        }
    }
}

impl From<MediaError> for veilcam_core::VeilError {
    fn from(e: MediaError) -> Self {
        veilcam_core::VeilError::Initialization {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = MediaError::InvalidFrameData {
            expected: 1024,
            actual: 512,
        };
        assert_eq!(
            error.to_string(),
            "Invalid frame data: expected 1024 bytes, got 512"
        );
    }

    #[test]
    fn test_recoverability() {
        let io_error = MediaError::Io {
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        assert!(io_error.is_recoverable());

        let model_error = MediaError::ModelLoadFailed {
            path: "models/rvm.onnx".to_string(),
            reason: "missing".to_string(),
        };
        assert!(!model_error.is_recoverable());
    }

    #[test]
    fn test_error_from_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let media_error = MediaError::from(io_error);

        match media_error {
            MediaError::Io { .. } => (),
            _ => panic!("Expected Io error variant"),
        }
    }
}
