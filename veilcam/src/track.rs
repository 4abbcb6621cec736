//! Track management and abstractions

use std::time::Instant;
use tracing::info;
use veilcam_core::{TrackInfo, TrackKind};

/// Where a track's media comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    /// Raw camera feed
    Camera,
    /// Camera feed after background replacement
    ProcessedCamera,
    /// Microphone
    Microphone,
    /// Source the room service reported but this client does not model
    Unknown,
}

impl TrackSource {
    /// Wire tag for this source
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSource::Camera => "camera",
            TrackSource::ProcessedCamera => "processed",
            TrackSource::Microphone => "microphone",
            TrackSource::Unknown => "unknown",
        }
    }

    /// Parse a wire tag
    pub fn from_str_tag(tag: &str) -> Self {
        match tag {
            "camera" => TrackSource::Camera,
            "processed" => TrackSource::ProcessedCamera,
            "microphone" => TrackSource::Microphone,
            _ => TrackSource::Unknown,
        }
    }
}

/// Local track representation for tracks published by this participant
#[derive(Debug, Clone)]
pub struct LocalTrack {
    id: String,
    kind: TrackKind,
    source: TrackSource,
    muted: bool,
    published_at: Instant,
}

impl LocalTrack {
    /// Create a local video track
    pub fn video(id: String, source: TrackSource) -> Self {
        info!("Creating local video track {} ({:?})", id, source);
        Self {
            id,
            kind: TrackKind::Video,
            source,
            muted: false,
            published_at: Instant::now(),
        }
    }

    /// Create a local audio track
    pub fn audio(id: String, source: TrackSource) -> Self {
        info!("Creating local audio track {} ({:?})", id, source);
        Self {
            id,
            kind: TrackKind::Audio,
            source,
            muted: false,
            published_at: Instant::now(),
        }
    }

    /// Track ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Track kind
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Track source
    pub fn source(&self) -> TrackSource {
        self.source
    }

    /// Whether the track is muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Mute the track
    pub fn mute(&mut self) {
        if !self.muted {
            info!("Muting local track {}", self.id);
            self.muted = true;
        }
    }

    /// Unmute the track
    pub fn unmute(&mut self) {
        if self.muted {
            info!("Unmuting local track {}", self.id);
            self.muted = false;
        }
    }

    /// How long the track has been published
    pub fn age(&self) -> std::time::Duration {
        self.published_at.elapsed()
    }

    /// Wire metadata for this track
    pub fn to_info(&self, participant_id: &str) -> TrackInfo {
        TrackInfo {
            track_id: self.id.clone(),
            participant_id: participant_id.to_string(),
            kind: self.kind,
            source: self.source.as_str().to_string(),
        }
    }
}

/// Remote track representation for tracks published by other participants
#[derive(Debug, Clone)]
pub struct RemoteTrack {
    id: String,
    participant_id: String,
    kind: TrackKind,
    source: TrackSource,
}

impl RemoteTrack {
    /// Build from the wire metadata the room service announced
    pub fn from_info(info: &TrackInfo) -> Self {
        Self {
            id: info.track_id.clone(),
            participant_id: info.participant_id.clone(),
            kind: info.kind,
            source: TrackSource::from_str_tag(&info.source),
        }
    }

    /// Track ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Owning participant ID
    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    /// Track kind
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Track source
    pub fn source(&self) -> TrackSource {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tags_roundtrip() {
        for source in [
            TrackSource::Camera,
            TrackSource::ProcessedCamera,
            TrackSource::Microphone,
        ] {
            assert_eq!(TrackSource::from_str_tag(source.as_str()), source);
        }
        assert_eq!(
            TrackSource::from_str_tag("screen-share"),
            TrackSource::Unknown
        );
    }

    #[test]
    fn local_track_mute_toggles() {
        let mut track = LocalTrack::audio("mic-1".to_string(), TrackSource::Microphone);
        assert!(!track.is_muted());
        track.mute();
        assert!(track.is_muted());
        track.unmute();
        assert!(!track.is_muted());
    }

    #[test]
    fn local_track_wire_info_carries_source_tag() {
        let track = LocalTrack::video("vid-1".to_string(), TrackSource::ProcessedCamera);
        let info = track.to_info("alice");
        assert_eq!(info.participant_id, "alice");
        assert_eq!(info.source, "processed");
        assert_eq!(info.kind, TrackKind::Video);
    }
}
