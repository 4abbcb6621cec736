//! Participant management and abstractions

use chrono::{DateTime, Utc};
use veilcam_core::ParticipantInfo;

/// Local participant representation
#[derive(Debug, Clone)]
pub struct LocalParticipant {
    id: String,
    joined_at: DateTime<Utc>,
}

impl LocalParticipant {
    pub(crate) fn new(id: String, joined_at: DateTime<Utc>) -> Self {
        Self { id, joined_at }
    }

    /// Participant ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When this participant joined the room
    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }
}

/// Remote participant representation
#[derive(Debug, Clone)]
pub struct RemoteParticipant {
    id: String,
    joined_at: DateTime<Utc>,
}

impl RemoteParticipant {
    /// Build from the roster entry the room service reported
    pub fn from_info(info: &ParticipantInfo) -> Self {
        Self {
            id: info.participant_id.clone(),
            joined_at: info.joined_at,
        }
    }

    /// Participant ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When this participant joined the room
    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }
}
