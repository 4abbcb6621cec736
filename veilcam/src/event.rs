//! Event system for room and participant events

use crate::{LocalTrack, RemoteParticipant, RemoteTrack};
use tokio::sync::mpsc;

/// Room events that can occur during a session
#[derive(Debug, Clone)]
pub enum Event {
    /// A participant joined the room
    ParticipantJoined {
        /// The participant that joined
        participant: RemoteParticipant,
    },
    /// A participant left the room
    ParticipantLeft {
        /// Participant ID that left
        participant_id: String,
    },
    /// A remote track was announced and subscribed
    TrackReceived {
        /// The track that was received
        track: RemoteTrack,
    },
    /// A remote track went away
    TrackRemoved {
        /// Track ID that was removed
        track_id: String,
    },
    /// A local track was published
    LocalTrackPublished {
        /// The local track that was published
        track: LocalTrack,
    },
    /// An error occurred in the room
    RoomError {
        /// Error description
        error: String,
        /// Whether the room remains usable
        recoverable: bool,
    },
    /// The room connection dropped
    RoomDisconnected {
        /// Reason for disconnection
        reason: String,
    },
}

impl Event {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::ParticipantJoined { .. } => "participant_joined",
            Event::ParticipantLeft { .. } => "participant_left",
            Event::TrackReceived { .. } => "track_received",
            Event::TrackRemoved { .. } => "track_removed",
            Event::LocalTrackPublished { .. } => "local_track_published",
            Event::RoomError { .. } => "room_error",
            Event::RoomDisconnected { .. } => "room_disconnected",
        }
    }

    /// Check if this is a participant-related event
    pub fn is_participant_event(&self) -> bool {
        matches!(
            self,
            Event::ParticipantJoined { .. } | Event::ParticipantLeft { .. }
        )
    }

    /// Check if this is a track-related event
    pub fn is_track_event(&self) -> bool {
        matches!(
            self,
            Event::TrackReceived { .. }
                | Event::TrackRemoved { .. }
                | Event::LocalTrackPublished { .. }
        )
    }

    /// Check if this is an error event
    pub fn is_error_event(&self) -> bool {
        matches!(self, Event::RoomError { .. })
    }
}

/// Stream of room events for async iteration
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    /// Create a new event stream from a receiver
    pub fn new(receiver: mpsc::UnboundedReceiver<Event>) -> Self {
        Self { receiver }
    }

    /// Get the next event from the stream
    pub async fn next(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Try to get the next event without blocking
    pub fn try_next(&mut self) -> Result<Option<Event>, mpsc::error::TryRecvError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(mpsc::error::TryRecvError::Disconnected)
            }
        }
    }

    /// Close the event stream
    pub fn close(&mut self) {
        self.receiver.close();
    }

    /// Check if the event stream is closed
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackSource;
    use veilcam_core::{ParticipantInfo, TrackInfo, TrackKind};

    fn test_remote_participant() -> RemoteParticipant {
        RemoteParticipant::from_info(&ParticipantInfo {
            participant_id: "remote-1".to_string(),
            joined_at: chrono::Utc::now(),
        })
    }

    fn test_remote_track() -> RemoteTrack {
        RemoteTrack::from_info(&TrackInfo {
            track_id: "trk-1".to_string(),
            participant_id: "remote-1".to_string(),
            kind: TrackKind::Video,
            source: "processed".to_string(),
        })
    }

    #[test]
    fn event_type_classification() {
        let participant_event = Event::ParticipantJoined {
            participant: test_remote_participant(),
        };
        assert!(participant_event.is_participant_event());
        assert!(!participant_event.is_track_event());

        let track_event = Event::TrackReceived {
            track: test_remote_track(),
        };
        assert!(track_event.is_track_event());
        assert!(!track_event.is_participant_event());

        let local_event = Event::LocalTrackPublished {
            track: LocalTrack::video("vid-1".to_string(), TrackSource::ProcessedCamera),
        };
        assert!(local_event.is_track_event());

        let error_event = Event::RoomError {
            error: "publish rejected".to_string(),
            recoverable: false,
        };
        assert!(error_event.is_error_event());
        assert!(!error_event.is_track_event());
    }

    #[tokio::test]
    async fn event_stream_delivers_in_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = EventStream::new(rx);

        tx.send(Event::ParticipantJoined {
            participant: test_remote_participant(),
        })
        .unwrap();
        tx.send(Event::RoomDisconnected {
            reason: "closed".to_string(),
        })
        .unwrap();

        assert_eq!(stream.next().await.unwrap().event_type(), "participant_joined");
        assert_eq!(stream.next().await.unwrap().event_type(), "room_disconnected");
        assert!(stream.try_next().unwrap().is_none());
    }
}
