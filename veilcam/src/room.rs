//! Room management and API
//!
//! [`RoomBuilder`] collects connection settings, [`Room`] owns the live
//! session: the event pump that auto-subscribes remote tracks and routes
//! incoming media to the sinks, plus publication of the processed camera
//! and the microphone.

use crate::config::RoomConfig;
use crate::event::{Event, EventStream};
use crate::participant::{LocalParticipant, RemoteParticipant};
use crate::track::{LocalTrack, RemoteTrack, TrackSource};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use veilcam_core::{
    JoinInfo, MediaEnvelope, MediaHeader, RoomSession, SessionEvent, TrackInfo, TrackKind,
    VeilError,
};
use veilcam_media::{
    AudioFrame, AudioSink, AudioSinkConfig, Background, CameraBackend, CameraConfig,
    MattingModel, MattingPipeline, MicrophoneCapture, MicrophoneConfig, NokhwaCamera,
    PipelineConfig, PipelineStats, VideoFrame, VideoSink,
};

/// Fluent builder for room configuration and connection
#[derive(Debug)]
pub struct RoomBuilder {
    service_url: String,
    token: Option<String>,
    config: RoomConfig,
}

impl RoomBuilder {
    pub(crate) fn new(service_url: String) -> Self {
        Self {
            service_url,
            token: None,
            config: RoomConfig::default(),
        }
    }

    /// Set the room token (required)
    pub fn token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Set the camera capture configuration
    pub fn camera(mut self, config: CameraConfig) -> Self {
        self.config.camera = config;
        self
    }

    /// Set the microphone capture configuration
    pub fn microphone(mut self, config: MicrophoneConfig) -> Self {
        self.config.microphone = config;
        self
    }

    /// Set the background image used for replacement
    pub fn background(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config.background_path = Some(path.into());
        self
    }

    /// Set the segmentation model file
    pub fn model(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config.model_path = Some(path.into());
        self
    }

    /// Set the processing resolution of the matting pipeline
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.config.processing_width = width;
        self.config.processing_height = height;
        self
    }

    /// Set the target framerate of the processed stream
    pub fn framerate(mut self, framerate: f64) -> Self {
        self.config.framerate = framerate;
        self
    }

    /// Set the participant cap this client enforces
    pub fn max_participants(mut self, max: usize) -> Self {
        self.config.max_participants = max;
        self
    }

    /// Enable or disable the processed video track
    pub fn video_enabled(mut self, enabled: bool) -> Self {
        self.config.video_enabled = enabled;
        self
    }

    /// Enable or disable the microphone track
    pub fn audio_enabled(mut self, enabled: bool) -> Self {
        self.config.audio_enabled = enabled;
        self
    }

    /// Join the room with the current configuration
    pub async fn join(self) -> Result<Room, VeilError> {
        if self.service_url.is_empty() {
            return Err(VeilError::MissingConfiguration {
                field: "service_url".to_string(),
            });
        }
        let token = self.token.ok_or_else(|| VeilError::MissingConfiguration {
            field: "token".to_string(),
        })?;
        self.config.validate()?;
        if self.config.video_enabled && self.config.model_path.is_none() {
            return Err(VeilError::MissingConfiguration {
                field: "model_path".to_string(),
            });
        }

        Room::join_internal(self.service_url, token, self.config).await
    }
}

struct RoomInner {
    session: RoomSession,
    info: JoinInfo,
    config: RoomConfig,
    event_tx: mpsc::UnboundedSender<Event>,
    audio_feed: Mutex<Option<mpsc::Sender<AudioFrame>>>,
    audio_sink: Mutex<Option<AudioSink>>,
    video_sink: Mutex<Option<Box<dyn VideoSink>>>,
}

impl RoomInner {
    /// Route an incoming media frame to the attached sink
    fn route_media(&self, envelope: MediaEnvelope) {
        let header = envelope.header;
        match header.kind {
            TrackKind::Video => {
                let (width, height) = match (header.width, header.height) {
                    (Some(w), Some(h)) => (w, h),
                    _ => {
                        debug!("Video frame without dimensions dropped");
                        return;
                    }
                };
                let frame =
                    match VideoFrame::new(width, height, envelope.payload, header.timestamp_ms) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("Malformed remote video frame: {}", e);
                            return;
                        }
                    };
                if let Some(sink) = self.video_sink.lock().as_mut() {
                    if let Err(e) = sink.render(frame) {
                        warn!("Video sink rejected frame: {}", e);
                    }
                }
            }
            TrackKind::Audio => {
                let frame = AudioFrame {
                    samples: AudioFrame::samples_from_le_bytes(&envelope.payload),
                    sample_rate: header.sample_rate.unwrap_or(48_000),
                    channels: header.channels.unwrap_or(1),
                    timestamp_ms: header.timestamp_ms,
                };
                if let Some(feed) = self.audio_feed.lock().as_ref() {
                    // Playback runs behind, drop rather than stall the pump
                    let _ = feed.try_send(frame);
                }
            }
        }
    }
}

/// A live room session
pub struct Room {
    inner: Arc<RoomInner>,
    event_rx: Option<mpsc::UnboundedReceiver<Event>>,
    pipeline: Option<MattingPipeline>,
    microphone: Option<MicrophoneCapture>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.inner.info.room_id)
            .field("participant_id", &self.inner.info.participant_id)
            .finish()
    }
}

impl Room {
    pub(crate) async fn join_internal(
        service_url: String,
        token: String,
        config: RoomConfig,
    ) -> Result<Self, VeilError> {
        let (session, session_events) = RoomSession::connect(&service_url).await?;
        let info = session.join(&token).await?;

        // The service admits anyone with a valid token; the two-party cap
        // is enforced here. Leave before surfacing the error.
        if info.participants.len() > config.max_participants {
            warn!(
                "Room {} over capacity ({} > {}), leaving",
                info.room_id,
                info.participants.len(),
                config.max_participants
            );
            let _ = session.leave().await;
            session.close();
            return Err(VeilError::RoomFull {
                room_id: info.room_id,
                max_participants: config.max_participants,
            });
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(RoomInner {
            session,
            info,
            config,
            event_tx,
            audio_feed: Mutex::new(None),
            audio_sink: Mutex::new(None),
            video_sink: Mutex::new(None),
        });

        // Subscribe whatever the room already carries before the pump
        // starts handling announcements
        let existing: Vec<String> = inner
            .info
            .tracks
            .iter()
            .filter(|t| t.participant_id != inner.info.participant_id)
            .map(|t| t.track_id.clone())
            .collect();
        if !existing.is_empty() {
            let subscribed = inner.session.subscribe(existing).await?;
            for track in &subscribed {
                let _ = inner.event_tx.send(Event::TrackReceived {
                    track: RemoteTrack::from_info(track),
                });
            }
        }

        tokio::spawn(pump_events(inner.clone(), session_events));

        Ok(Self {
            inner,
            event_rx: Some(event_rx),
            pipeline: None,
            microphone: None,
        })
    }

    /// Room ID
    pub fn id(&self) -> &str {
        &self.inner.info.room_id
    }

    /// Participant ID assigned to this client
    pub fn participant_id(&self) -> &str {
        &self.inner.info.participant_id
    }

    /// Local participant
    pub fn local_participant(&self) -> LocalParticipant {
        let joined_at = self
            .inner
            .info
            .participants
            .iter()
            .find(|p| p.participant_id == self.inner.info.participant_id)
            .map(|p| p.joined_at)
            .unwrap_or_else(chrono::Utc::now);
        LocalParticipant::new(self.inner.info.participant_id.clone(), joined_at)
    }

    /// Participants that were present when this client joined
    pub fn initial_participants(&self) -> Vec<RemoteParticipant> {
        self.inner
            .info
            .participants
            .iter()
            .filter(|p| p.participant_id != self.inner.info.participant_id)
            .map(RemoteParticipant::from_info)
            .collect()
    }

    /// Take the room event stream
    ///
    /// The stream can be taken once; later calls return an empty stream.
    pub fn events(&mut self) -> EventStream {
        match self.event_rx.take() {
            Some(receiver) => EventStream::new(receiver),
            None => {
                warn!("Room event stream already taken");
                let (_tx, receiver) = mpsc::unbounded_channel();
                EventStream::new(receiver)
            }
        }
    }

    /// Attach a sink for subscribed remote video
    pub fn set_video_sink(&self, sink: Box<dyn VideoSink>) {
        *self.inner.video_sink.lock() = Some(sink);
    }

    /// Start playing subscribed remote audio on the default output device
    pub fn play_remote_audio(&self) -> Result<(), VeilError> {
        let mut sink = AudioSink::new();
        let feed = sink.start(AudioSinkConfig::default())?;
        *self.inner.audio_feed.lock() = Some(feed);
        *self.inner.audio_sink.lock() = Some(sink);
        Ok(())
    }

    /// Publish the background-replaced camera feed as a video track
    pub async fn publish_processed_camera(&mut self) -> Result<LocalTrack, VeilError> {
        if !self.inner.config.video_enabled {
            return Err(VeilError::InvalidState {
                expected: "video enabled".to_string(),
                actual: "video disabled".to_string(),
            });
        }
        let (track, pipeline, frames) = self.start_matting_pipeline()?;
        let info = track.to_info(self.participant_id());
        if let Err(e) = self.inner.session.publish_tracks(vec![info]).await {
            // Publish is all or nothing, tear the pipeline back down
            drop(pipeline);
            return Err(e);
        }

        tokio::spawn(forward_video(
            self.inner.clone(),
            track.id().to_string(),
            frames,
        ));
        self.pipeline = Some(pipeline);
        let _ = self.inner.event_tx.send(Event::LocalTrackPublished {
            track: track.clone(),
        });
        info!("Published processed camera track {}", track.id());
        Ok(track)
    }

    /// Publish the microphone as an audio track
    pub async fn publish_microphone(&mut self) -> Result<LocalTrack, VeilError> {
        if !self.inner.config.audio_enabled {
            return Err(VeilError::InvalidState {
                expected: "audio enabled".to_string(),
                actual: "audio disabled".to_string(),
            });
        }
        let (track, microphone, frames) = self.start_microphone()?;
        let info = track.to_info(self.participant_id());
        if let Err(e) = self.inner.session.publish_tracks(vec![info]).await {
            drop(microphone);
            return Err(e);
        }

        tokio::spawn(forward_audio(
            self.inner.clone(),
            track.id().to_string(),
            frames,
        ));
        self.microphone = Some(microphone);
        let _ = self.inner.event_tx.send(Event::LocalTrackPublished {
            track: track.clone(),
        });
        info!("Published microphone track {}", track.id());
        Ok(track)
    }

    /// Publish microphone audio and the processed camera feed together
    ///
    /// Both tracks go to the service in one request; if it fails, neither
    /// is published and capture stops. Returns `(audio, video)`.
    pub async fn publish_media(&mut self) -> Result<(LocalTrack, LocalTrack), VeilError> {
        if !self.inner.config.audio_enabled || !self.inner.config.video_enabled {
            return Err(VeilError::InvalidState {
                expected: "audio and video enabled".to_string(),
                actual: "a track kind is disabled".to_string(),
            });
        }
        let (audio_track, microphone, audio_frames) = self.start_microphone()?;
        let (video_track, pipeline, video_frames) = match self.start_matting_pipeline() {
            Ok(started) => started,
            Err(e) => {
                drop(microphone);
                return Err(e);
            }
        };

        let infos = vec![
            audio_track.to_info(self.participant_id()),
            video_track.to_info(self.participant_id()),
        ];
        if let Err(e) = self.inner.session.publish_tracks(infos).await {
            drop(microphone);
            drop(pipeline);
            return Err(e);
        }

        tokio::spawn(forward_audio(
            self.inner.clone(),
            audio_track.id().to_string(),
            audio_frames,
        ));
        tokio::spawn(forward_video(
            self.inner.clone(),
            video_track.id().to_string(),
            video_frames,
        ));
        self.microphone = Some(microphone);
        self.pipeline = Some(pipeline);
        for track in [&audio_track, &video_track] {
            let _ = self.inner.event_tx.send(Event::LocalTrackPublished {
                track: track.clone(),
            });
        }
        info!(
            "Published media tracks (audio {}, video {})",
            audio_track.id(),
            video_track.id()
        );
        Ok((audio_track, video_track))
    }

    /// Matting pipeline statistics, if the processed camera is publishing
    pub fn pipeline_stats(&self) -> Option<PipelineStats> {
        self.pipeline.as_ref().map(|p| p.stats())
    }

    /// Leave the room and stop all capture and playback
    pub async fn leave(&mut self) -> Result<(), VeilError> {
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.stop();
        }
        if let Some(mut microphone) = self.microphone.take() {
            microphone.stop();
        }
        if let Some(mut sink) = self.inner.audio_sink.lock().take() {
            sink.stop();
        }
        *self.inner.audio_feed.lock() = None;

        let result = self.inner.session.leave().await;
        self.inner.session.close();
        info!("Left room {}", self.inner.info.room_id);
        result
    }

    fn start_matting_pipeline(
        &self,
    ) -> Result<(LocalTrack, MattingPipeline, mpsc::Receiver<VideoFrame>), VeilError> {
        let config = &self.inner.config;
        let model_path =
            config
                .model_path
                .as_ref()
                .ok_or_else(|| VeilError::MissingConfiguration {
                    field: "model_path".to_string(),
                })?;
        let background_path =
            config
                .background_path
                .as_ref()
                .ok_or_else(|| VeilError::MissingConfiguration {
                    field: "background_path".to_string(),
                })?;

        // Built once per publish, sized to the processing resolution
        let background = Background::from_image_path(
            background_path,
            config.processing_width,
            config.processing_height,
        )?;
        let model = MattingModel::load(model_path)?;
        let camera: Box<dyn CameraBackend> = Box::new(NokhwaCamera::new());
        let pipeline_config = PipelineConfig {
            width: config.processing_width,
            height: config.processing_height,
            framerate: config.framerate,
            camera: config.camera.clone(),
        };
        let (pipeline, frames) =
            MattingPipeline::start(camera, Box::new(model), background, pipeline_config)?;
        let track = LocalTrack::video(
            uuid::Uuid::new_v4().to_string(),
            TrackSource::ProcessedCamera,
        );
        Ok((track, pipeline, frames))
    }

    fn start_microphone(
        &self,
    ) -> Result<(LocalTrack, MicrophoneCapture, mpsc::Receiver<AudioFrame>), VeilError> {
        let mut microphone = MicrophoneCapture::new();
        let frames = microphone.start(self.inner.config.microphone.clone())?;
        let track = LocalTrack::audio(uuid::Uuid::new_v4().to_string(), TrackSource::Microphone);
        Ok((track, microphone, frames))
    }
}

/// Session event pump
///
/// Forwards roster and track events to the application stream,
/// auto-subscribes announced tracks and routes media to the sinks.
async fn pump_events(
    inner: Arc<RoomInner>,
    mut session_events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    while let Some(event) = session_events.recv().await {
        match event {
            SessionEvent::TracksAnnounced { tracks } => {
                let remote: Vec<TrackInfo> = tracks
                    .into_iter()
                    .filter(|t| t.participant_id != inner.info.participant_id)
                    .collect();
                if remote.is_empty() {
                    continue;
                }
                let ids = remote.iter().map(|t| t.track_id.clone()).collect();
                match inner.session.subscribe(ids).await {
                    Ok(subscribed) => {
                        for track in &subscribed {
                            let _ = inner.event_tx.send(Event::TrackReceived {
                                track: RemoteTrack::from_info(track),
                            });
                        }
                    }
                    Err(e) => {
                        warn!("Auto-subscribe failed: {}", e);
                        let _ = inner.event_tx.send(Event::RoomError {
                            error: e.to_string(),
                            recoverable: true,
                        });
                    }
                }
            }
            SessionEvent::TrackRemoved { track_id } => {
                let _ = inner.event_tx.send(Event::TrackRemoved { track_id });
            }
            SessionEvent::ParticipantJoined { participant } => {
                let _ = inner.event_tx.send(Event::ParticipantJoined {
                    participant: RemoteParticipant::from_info(&participant),
                });
            }
            SessionEvent::ParticipantLeft { participant_id } => {
                let _ = inner
                    .event_tx
                    .send(Event::ParticipantLeft { participant_id });
            }
            SessionEvent::MediaReceived { envelope } => {
                inner.route_media(envelope);
            }
            SessionEvent::ServiceError { code, reason } => {
                let _ = inner.event_tx.send(Event::RoomError {
                    error: format!("service error {}: {}", code, reason),
                    recoverable: true,
                });
            }
            SessionEvent::Disconnected { reason } => {
                let _ = inner.event_tx.send(Event::RoomDisconnected { reason });
                break;
            }
        }
    }
    debug!("Room event pump finished");
}

async fn forward_video(
    inner: Arc<RoomInner>,
    track_id: String,
    mut frames: mpsc::Receiver<VideoFrame>,
) {
    while let Some(frame) = frames.recv().await {
        let envelope = MediaEnvelope {
            header: MediaHeader {
                track_id: track_id.clone(),
                timestamp_ms: frame.timestamp_ms,
                kind: TrackKind::Video,
                width: Some(frame.width),
                height: Some(frame.height),
                sample_rate: None,
                channels: None,
            },
            payload: frame.data,
        };
        if inner.session.send_media(&envelope).is_err() {
            break;
        }
    }
    debug!("Video forwarder for track {} finished", track_id);
}

async fn forward_audio(
    inner: Arc<RoomInner>,
    track_id: String,
    mut frames: mpsc::Receiver<AudioFrame>,
) {
    while let Some(frame) = frames.recv().await {
        let envelope = MediaEnvelope {
            header: MediaHeader {
                track_id: track_id.clone(),
                timestamp_ms: frame.timestamp_ms,
                kind: TrackKind::Audio,
                width: None,
                height: None,
                sample_rate: Some(frame.sample_rate),
                channels: Some(frame.channels),
            },
            payload: frame.to_le_bytes(),
        };
        if inner.session.send_media(&envelope).is_err() {
            break;
        }
    }
    debug!("Audio forwarder for track {} finished", track_id);
}
