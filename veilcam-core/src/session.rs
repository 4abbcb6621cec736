//! Room session client
//!
//! [`RoomSession`] is the client half of the room service connection: it
//! dials the service over WebSocket, performs the token join handshake and
//! carries publish/subscribe requests plus media frames. It owns no
//! protocol logic beyond request/ack correlation; retries and recovery are
//! deliberately absent.

use crate::signaling::{
    ClientMessage, MediaEnvelope, ParticipantInfo, ServerMessage, TrackInfo,
};
use crate::VeilError;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Default timeout for a single request/ack exchange
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Media frames queued for the socket before new ones are dropped
const MEDIA_QUEUE_DEPTH: usize = 8;

/// Events surfaced by the session to the room layer
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Remote tracks were announced
    TracksAnnounced {
        /// The announced tracks
        tracks: Vec<TrackInfo>,
    },
    /// A remote track was removed
    TrackRemoved {
        /// Track ID that went away
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
    /// A media frame arrived for a subscribed track
    MediaReceived {
        /// The decoded envelope
        envelope: MediaEnvelope,
    },
    /// The service reported an error not tied to any request
    ServiceError {
        /// Provider error code
        code: u32,
        /// Error reason
        reason: String,
    },
    /// The connection to the room service dropped
    Disconnected {
        /// Reason for the disconnect
        reason: String,
    },
}

/// Result of a successful join
#[derive(Debug, Clone)]
pub struct JoinInfo {
    /// Room ID resolved from the token
    pub room_id: String,
    /// Participant ID assigned to this client
    pub participant_id: String,
    /// Participants already present (including this client)
    pub participants: Vec<ParticipantInfo>,
    /// Tracks already published in the room
    pub tracks: Vec<TrackInfo>,
}

type Pending = Arc<DashMap<u64, oneshot::Sender<ServerMessage>>>;

/// Client session against the room service
pub struct RoomSession {
    outbound: mpsc::UnboundedSender<Message>,
    media_outbound: mpsc::Sender<Message>,
    pending: Pending,
    next_request_id: AtomicU64,
    read_task: tokio::task::JoinHandle<()>,
    write_task: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl RoomSession {
    /// Connect to the room service
    ///
    /// Returns the session and the receiver for service-initiated events.
    pub async fn connect(
        url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), VeilError> {
        info!("Connecting to room service at {}", url);
        let (stream, _response) =
            connect_async(url)
                .await
                .map_err(|e| VeilError::Signaling {
                    reason: format!("connect to {} failed: {}", url, e),
                })?;

        let (mut ws_write, mut ws_read) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (media_outbound, mut media_rx) = mpsc::channel::<Message>(MEDIA_QUEUE_DEPTH);
        let (event_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();
        let pending: Pending = Arc::new(DashMap::new());

        // Writer task: control messages get an unbounded queue and take
        // priority; media rides a bounded queue so a stalled socket sheds
        // frames instead of accumulating them
        let write_task = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    biased;
                    control = outbound_rx.recv() => control,
                    media = media_rx.recv() => media,
                };
                let Some(message) = message else { break };
                if let Err(e) = ws_write.send(message).await {
                    error!("Room service send failed: {}", e);
                    break;
                }
            }
        });

        // Reader task: dispatches acks to pending requests, events to the
        // event channel
        let pending_reader = pending.clone();
        let read_task = tokio::spawn(async move {
            while let Some(message) = ws_read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(msg) => {
                                Self::dispatch_message(msg, &pending_reader, &event_tx);
                            }
                            Err(e) => {
                                warn!("Ignoring unparseable service message: {}", e);
                            }
                        }
                    }
                    Ok(Message::Binary(data)) => match MediaEnvelope::decode(&data) {
                        Ok(envelope) => {
                            let _ = event_tx.send(SessionEvent::MediaReceived { envelope });
                        }
                        Err(e) => {
                            warn!("Dropping malformed media frame: {}", e);
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .unwrap_or_else(|| "closed by service".to_string());
                        info!("Room service closed the connection: {}", reason);
                        let _ = event_tx.send(SessionEvent::Disconnected { reason });
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Room service read failed: {}", e);
                        let _ = event_tx.send(SessionEvent::Disconnected {
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
            }
        });

        Ok((
            Self {
                outbound,
                media_outbound,
                pending,
                next_request_id: AtomicU64::new(1),
                read_task,
                write_task,
            },
            event_rx,
        ))
    }

    fn dispatch_message(
        msg: ServerMessage,
        pending: &Pending,
        event_tx: &mpsc::UnboundedSender<SessionEvent>,
    ) {
        if let Some(request_id) = msg.request_id() {
            if let Some((_, waiter)) = pending.remove(&request_id) {
                let _ = waiter.send(msg);
                return;
            }
            debug!("Ack for unknown request {} dropped", request_id);
            return;
        }

        let event = match msg {
            ServerMessage::TrackAdded { tracks } => SessionEvent::TracksAnnounced { tracks },
            ServerMessage::TrackRemoved { track_id } => SessionEvent::TrackRemoved { track_id },
            ServerMessage::ParticipantJoined { participant } => {
                SessionEvent::ParticipantJoined { participant }
            }
            ServerMessage::ParticipantLeft { participant_id } => {
                SessionEvent::ParticipantLeft { participant_id }
            }
            ServerMessage::Error { code, reason, .. } => {
                warn!("Room service error {}: {}", code, reason);
                SessionEvent::ServiceError { code, reason }
            }
            other => {
                debug!("Unhandled service message: {:?}", other);
                return;
            }
        };
        let _ = event_tx.send(event);
    }

    /// Join the room identified by the token
    pub async fn join(&self, token: &str) -> Result<JoinInfo, VeilError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .request(
                request_id,
                ClientMessage::JoinRoom {
                    request_id,
                    token: token.to_string(),
                },
                "join",
            )
            .await?;

        match response {
            ServerMessage::JoinedRoom {
                room_id,
                participant_id,
                participants,
                tracks,
                ..
            } => {
                info!(
                    "Joined room {} as {} ({} participants, {} tracks)",
                    room_id,
                    participant_id,
                    participants.len(),
                    tracks.len()
                );
                Ok(JoinInfo {
                    room_id,
                    participant_id,
                    participants,
                    tracks,
                })
            }
            ServerMessage::Error { code, reason, .. } => Err(VeilError::Connection {
                room_id: "unknown".to_string(),
                reason,
                code: Some(code),
            }),
            other => Err(VeilError::InvalidState {
                expected: "JoinedRoom".to_string(),
                actual: format!("{:?}", other),
            }),
        }
    }

    /// Leave the room
    pub async fn leave(&self) -> Result<(), VeilError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .request(request_id, ClientMessage::LeaveRoom { request_id }, "leave")
            .await?;

        match response {
            ServerMessage::LeftRoom { .. } => Ok(()),
            ServerMessage::Error { code, reason, .. } => Err(VeilError::Connection {
                room_id: "unknown".to_string(),
                reason,
                code: Some(code),
            }),
            other => Err(VeilError::InvalidState {
                expected: "LeftRoom".to_string(),
                actual: format!("{:?}", other),
            }),
        }
    }

    /// Publish all local tracks in one request
    pub async fn publish_tracks(&self, tracks: Vec<TrackInfo>) -> Result<Vec<TrackInfo>, VeilError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .request(
                request_id,
                ClientMessage::PublishTracks { request_id, tracks },
                "publish",
            )
            .await?;

        match response {
            ServerMessage::TracksPublished { tracks, .. } => Ok(tracks),
            ServerMessage::Error { code, reason, .. } => {
                Err(VeilError::PublishFailed { code, reason })
            }
            other => Err(VeilError::InvalidState {
                expected: "TracksPublished".to_string(),
                actual: format!("{:?}", other),
            }),
        }
    }

    /// Subscribe to remote tracks by ID
    pub async fn subscribe(&self, track_ids: Vec<String>) -> Result<Vec<TrackInfo>, VeilError> {
        if track_ids.is_empty() {
            return Ok(Vec::new());
        }
        let first = track_ids[0].clone();
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .request(
                request_id,
                ClientMessage::Subscribe {
                    request_id,
                    track_ids,
                },
                "subscribe",
            )
            .await?;

        match response {
            ServerMessage::Subscribed { tracks, .. } => Ok(tracks),
            ServerMessage::Error { code, reason, .. } => Err(VeilError::SubscriptionFailed {
                track_id: first,
                code,
                reason,
            }),
            other => Err(VeilError::InvalidState {
                expected: "Subscribed".to_string(),
                actual: format!("{:?}", other),
            }),
        }
    }

    /// Send a media frame for a published track
    ///
    /// Frames that would overflow the bounded outbound queue are dropped,
    /// never accumulated behind a stalled socket.
    pub fn send_media(&self, envelope: &MediaEnvelope) -> Result<(), VeilError> {
        let data = envelope.encode().map_err(|e| VeilError::InvalidData {
            reason: format!("media envelope encode failed: {}", e),
        })?;
        match self.media_outbound.try_send(Message::Binary(data)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Outbound media queue full, frame dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(VeilError::SessionClosed),
        }
    }

    async fn request(
        &self,
        request_id: u64,
        message: ClientMessage,
        operation: &str,
    ) -> Result<ServerMessage, VeilError> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, tx);

        let text = serde_json::to_string(&message).map_err(|e| VeilError::InvalidData {
            reason: format!("request encode failed: {}", e),
        })?;
        if self.outbound.send(Message::Text(text)).is_err() {
            self.pending.remove(&request_id);
            return Err(VeilError::SessionClosed);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.pending.remove(&request_id);
                Err(VeilError::SessionClosed)
            }
            Err(_) => {
                self.pending.remove(&request_id);
                Err(VeilError::Timeout {
                    operation: operation.to_string(),
                    duration: REQUEST_TIMEOUT,
                })
            }
        }
    }

    /// Tear down the socket tasks
    pub fn close(&self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.close();
    }
}
