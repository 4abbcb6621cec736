//! # veilcam - Virtual-background video rooms
//!
//! veilcam joins a two-party video room, replaces the background of the
//! local camera feed with an image using a recurrent segmentation model,
//! and publishes the processed video together with the microphone. Remote
//! tracks are subscribed automatically and routed to playback sinks.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use veilcam::VeilCam;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let veilcam = VeilCam::init()?;
//!
//!     let mut room = veilcam
//!         .room("wss://rooms.example.com/ws")
//!         .token("room-token")
//!         .model("rvm_mobilenetv3.onnx")
//!         .background("beach.png")
//!         .join()
//!         .await?;
//!
//!     room.publish_media().await?;
//!     room.play_remote_audio()?;
//!
//!     let mut events = room.events();
//!     while let Some(event) = events.next().await {
//!         println!("Room event: {:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export the session and media layers for direct use
pub use veilcam_core::{
    JoinInfo, MediaEnvelope, MediaHeader, ParticipantInfo, RoomSession, SessionEvent, TrackInfo,
    TrackKind, VeilError,
};
pub use veilcam_media::{
    AudioFrame, AudioSink, AudioSinkConfig, Background, BufferedVideoSink, CameraConfig,
    Compositor, MattingEngine, MattingModel, MattingPipeline, MediaError, MicrophoneCapture,
    MicrophoneConfig,
    PipelineConfig, PipelineStats, VideoFrame, VideoSink,
};

// Public API modules
pub mod config;
pub mod event;
pub mod participant;
pub mod room;
pub mod track;

// Re-export main API types
pub use config::{GlobalConfig, RoomConfig};
pub use event::{Event, EventStream};
pub use participant::{LocalParticipant, RemoteParticipant};
pub use room::{Room, RoomBuilder};
pub use track::{LocalTrack, RemoteTrack, TrackSource};

/// Main entry point for veilcam
#[derive(Debug, Clone)]
pub struct VeilCam {
    config: GlobalConfig,
}

impl VeilCam {
    /// Initialize veilcam with default settings
    pub fn init() -> Result<Self, VeilError> {
        Self::init_with(GlobalConfig::default())
    }

    /// Initialize with custom global configuration
    ///
    /// With `debug_logging` enabled a default tracing subscriber is
    /// installed, unless the application already set one up.
    pub fn init_with(config: GlobalConfig) -> Result<Self, VeilError> {
        if config.debug_logging {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "veilcam=debug".into()),
                )
                .try_init();
        }
        Ok(Self { config })
    }

    /// Global configuration
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Create a room builder for the given room service URL
    ///
    /// An empty URL falls back to the configured default service URL.
    pub fn room(&self, service_url: &str) -> RoomBuilder {
        let url = if service_url.is_empty() {
            self.config.default_service_url.clone().unwrap_or_default()
        } else {
            service_url.to_string()
        };
        RoomBuilder::new(url)
    }
}
