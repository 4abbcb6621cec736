//! Error types for veilcam

use thiserror::Error;

/// Main error type for room session operations
#[derive(Error, Debug)]
pub enum VeilError {
    /// Initialization error
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Reason for initialization failure
        reason: String,
    },

    /// Missing configuration error
    #[error("Missing required configuration: {field}")]
    MissingConfiguration {
        /// Missing configuration field
        field: String,
    },

    /// Connection error
    #[error("Connection failed for room {room_id}: {reason}")]
    Connection {
        /// Room ID where connection failed
        room_id: String,
        /// Reason for connection failure
        reason: String,
        /// Provider error code, when the room service supplied one
        code: Option<u32>,
    },

    /// Room join rejected because the room is already full
    #[error("Room {room_id} is full (max participants: {max_participants})")]
    RoomFull {
        /// Room ID that is full
        room_id: String,
        /// Maximum participants allowed
        max_participants: usize,
    },

    /// Publishing local tracks failed
    #[error("Publish failed (code {code}): {reason}")]
    PublishFailed {
        /// Provider error code
        code: u32,
        /// Error reason
        reason: String,
    },

    /// Subscription failed
    #[error("Subscription failed for track {track_id} (code {code}): {reason}")]
    SubscriptionFailed {
        /// Track that could not be subscribed
        track_id: String,
        /// Provider error code
        code: u32,
        /// Error reason
        reason: String,
    },

    /// Track not found error
    #[error("Track not found: {track_id}")]
    TrackNotFound {
        /// Track ID
        track_id: String,
    },

    /// Invalid state error
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Invalid data error
    #[error("Invalid data: {reason}")]
    InvalidData {
        /// Reason for invalid data
        reason: String,
    },

    /// Signaling transport error
    #[error("Signaling error: {reason}")]
    Signaling {
        /// Reason for signaling error
        reason: String,
    },

    /// Session closed while an operation was in flight
    #[error("Session closed")]
    SessionClosed,

    /// Operation timed out error
    #[error("Operation timed out: {operation} after {duration:?}")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Duration after which timeout occurred
        duration: std::time::Duration,
    },
}

impl VeilError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> String {
        match self {
            VeilError::Initialization { .. } => "INITIALIZATION_FAILED".to_string(),
            VeilError::MissingConfiguration { .. } => "MISSING_CONFIGURATION".to_string(),
            VeilError::Connection { .. } => "CONNECTION_FAILED".to_string(),
            VeilError::RoomFull { .. } => "ROOM_FULL".to_string(),
            VeilError::PublishFailed { .. } => "PUBLISH_FAILED".to_string(),
            VeilError::SubscriptionFailed { .. } => "SUBSCRIPTION_FAILED".to_string(),
            VeilError::TrackNotFound { .. } => "TRACK_NOT_FOUND".to_string(),
            VeilError::InvalidState { .. } => "INVALID_STATE".to_string(),
            VeilError::InvalidData { .. } => "INVALID_DATA".to_string(),
            VeilError::Signaling { .. } => "SIGNALING_ERROR".to_string(),
            VeilError::SessionClosed => "SESSION_CLOSED".to_string(),
            VeilError::Timeout { .. } => "TIMEOUT".to_string(),
        }
    }

    /// Numeric provider code carried by the error, if any
    pub fn provider_code(&self) -> Option<u32> {
        match self {
            VeilError::Connection { code, .. } => *code,
            VeilError::PublishFailed { code, .. } => Some(*code),
            VeilError::SubscriptionFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}
