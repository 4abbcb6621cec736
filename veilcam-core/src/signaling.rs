//! Room service wire messages
//!
//! The room service speaks JSON over WebSocket. Control messages are text
//! frames carrying one of the enums below; media payloads ride as binary
//! frames with a length-prefixed JSON header (see [`MediaEnvelope`]).

use serde::{Deserialize, Serialize};

/// Kind of a published track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Metadata describing a track known to the room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Track ID
    pub track_id: String,
    /// Participant that owns the track
    pub participant_id: String,
    /// Track kind
    pub kind: TrackKind,
    /// Free-form tag describing the source ("camera", "microphone", "processed")
    pub source: String,
}

/// Participant roster entry as reported by the room service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantInfo {
    /// Participant ID
    pub participant_id: String,
    /// When the participant joined
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

/// Client-to-service messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room with a room token
    JoinRoom {
        /// Correlation ID for the acknowledgement
        request_id: u64,
        /// Room token issued by the application backend
        token: String,
    },
    /// Leave the current room
    LeaveRoom {
        /// Correlation ID for the acknowledgement
        request_id: u64,
    },
    /// Announce local tracks for publication
    PublishTracks {
        /// Correlation ID for the acknowledgement
        request_id: u64,
        /// Tracks to publish
        tracks: Vec<TrackInfo>,
    },
    /// Subscribe to remote tracks by ID
    Subscribe {
        /// Correlation ID for the acknowledgement
        request_id: u64,
        /// Track IDs to subscribe to
        track_ids: Vec<String>,
    },
}

/// Service-to-client messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join succeeded
    JoinedRoom {
        /// Correlation ID of the join request
        request_id: u64,
        /// Room ID resolved from the token
        room_id: String,
        /// Participant ID assigned to this client
        participant_id: String,
        /// Participants already in the room (including this client)
        participants: Vec<ParticipantInfo>,
        /// Tracks already published in the room
        tracks: Vec<TrackInfo>,
    },
    /// Leave acknowledged
    LeftRoom {
        /// Correlation ID of the leave request
        request_id: u64,
    },
    /// Publish acknowledged
    TracksPublished {
        /// Correlation ID of the publish request
        request_id: u64,
        /// Tracks accepted by the service
        tracks: Vec<TrackInfo>,
    },
    /// Subscribe acknowledged
    Subscribed {
        /// Correlation ID of the subscribe request
        request_id: u64,
        /// Tracks now subscribed
        tracks: Vec<TrackInfo>,
    },
    /// Another participant published tracks
    TrackAdded {
        /// Newly announced tracks
        tracks: Vec<TrackInfo>,
    },
    /// A remote track went away
    TrackRemoved {
        /// Track ID that was removed
        track_id: String,
    },
    /// A participant joined the room
    ParticipantJoined {
        /// The participant that joined
        participant: ParticipantInfo,
    },
    /// A participant left the room
    ParticipantLeft {
        /// Participant ID that left
        participant_id: String,
    },
    /// Request failed
    Error {
        /// Correlation ID of the failed request, when applicable
        request_id: Option<u64>,
        /// Provider error code
        code: u32,
        /// Error reason
        reason: String,
    },
}

impl ServerMessage {
    /// Correlation ID this message acknowledges, if it is an ack
    pub fn request_id(&self) -> Option<u64> {
        match self {
            ServerMessage::JoinedRoom { request_id, .. }
            | ServerMessage::LeftRoom { request_id }
            | ServerMessage::TracksPublished { request_id, .. }
            | ServerMessage::Subscribed { request_id, .. } => Some(*request_id),
            ServerMessage::Error { request_id, .. } => *request_id,
            _ => None,
        }
    }
}

/// Header carried in front of every binary media frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaHeader {
    /// Track the payload belongs to
    pub track_id: String,
    /// Capture timestamp in milliseconds
    pub timestamp_ms: u64,
    /// Track kind
    pub kind: TrackKind,
    /// Frame width (video only)
    pub width: Option<u32>,
    /// Frame height (video only)
    pub height: Option<u32>,
    /// Sample rate (audio only)
    pub sample_rate: Option<u32>,
    /// Channel count (audio only)
    pub channels: Option<u8>,
}

/// A media frame as it travels on the wire: JSON header, raw payload
#[derive(Debug, Clone)]
pub struct MediaEnvelope {
    /// Frame metadata
    pub header: MediaHeader,
    /// Raw payload bytes (RGBA8 pixels or f32 LE samples)
    pub payload: Vec<u8>,
}

impl MediaEnvelope {
    /// Encode as a binary WebSocket payload: u32 BE header length, JSON
    /// header, raw media bytes. This is the room service's framing, not ours.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let header = serde_json::to_vec(&self.header)?;
        let mut out = Vec::with_capacity(4 + header.len() + self.payload.len());
        out.extend_from_slice(&(header.len() as u32).to_be_bytes());
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Decode a binary WebSocket payload
    pub fn decode(data: &[u8]) -> Result<Self, crate::VeilError> {
        if data.len() < 4 {
            return Err(crate::VeilError::InvalidData {
                reason: "media frame shorter than header length prefix".to_string(),
            });
        }
        let header_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if data.len() < 4 + header_len {
            return Err(crate::VeilError::InvalidData {
                reason: format!(
                    "media frame truncated: header claims {} bytes, {} available",
                    header_len,
                    data.len() - 4
                ),
            });
        }
        let header: MediaHeader =
            serde_json::from_slice(&data[4..4 + header_len]).map_err(|e| {
                crate::VeilError::InvalidData {
                    reason: format!("bad media header: {}", e),
                }
            })?;
        Ok(Self {
            header,
            payload: data[4 + header_len..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_envelope_roundtrip() {
        let envelope = MediaEnvelope {
            header: MediaHeader {
                track_id: "trk-1".to_string(),
                timestamp_ms: 42,
                kind: TrackKind::Video,
                width: Some(480),
                height: Some(320),
                sample_rate: None,
                channels: None,
            },
            payload: vec![1, 2, 3, 4],
        };

        let encoded = envelope.encode().unwrap();
        let decoded = MediaEnvelope::decode(&encoded).unwrap();
        assert_eq!(decoded.header.track_id, "trk-1");
        assert_eq!(decoded.header.width, Some(480));
        assert_eq!(decoded.payload, vec![1, 2, 3, 4]);
    }

    #[test]
    fn media_envelope_rejects_truncated_input() {
        assert!(MediaEnvelope::decode(&[0, 0]).is_err());
        // Header length prefix larger than the buffer
        assert!(MediaEnvelope::decode(&[0, 0, 0, 200, 1, 2]).is_err());
    }

    #[test]
    fn server_message_request_id_routing() {
        let ack = ServerMessage::LeftRoom { request_id: 7 };
        assert_eq!(ack.request_id(), Some(7));

        let event = ServerMessage::TrackRemoved {
            track_id: "trk-1".to_string(),
        };
        assert_eq!(event.request_id(), None);

        let err = ServerMessage::Error {
            request_id: Some(9),
            code: 10051,
            reason: "room full".to_string(),
        };
        assert_eq!(err.request_id(), Some(9));
    }
}
