//! Media processing for veilcam
//!
//! Camera and microphone capture, the recurrent matting model, the
//! background compositor, the frame pipeline that ties them together,
//! and playback sinks for subscribed remote tracks.
//!
//! The pipeline is the centerpiece: it pulls RGBA frames from the
//! camera, runs segmentation inference carrying the recurrent state
//! between frames, substitutes the background behind the speaker and
//! emits the processed stream for publication.

#![warn(clippy::all)]

pub mod audio_capture;
pub mod background;
pub mod capture;
pub mod error;
pub mod frames;
pub mod matting;
pub mod pipeline;
pub mod sink;

pub use audio_capture::{MicrophoneCapture, MicrophoneConfig};
pub use background::{Background, Compositor};
pub use capture::{
    enumerate_cameras, CameraBackend, CameraConfig, CameraDevice, NokhwaCamera, TestPatternCamera,
};
pub use error::{MediaError, MediaResult};
pub use frames::{AudioFrame, MediaFrame, VideoFrame};
pub use matting::{MatteOutput, MattingEngine, MattingModel, DEFAULT_DOWNSAMPLE_RATIO};
pub use pipeline::{MattingPipeline, PipelineConfig, PipelineStats};
pub use sink::{AudioSink, AudioSinkConfig, BufferedVideoSink, VideoSink};
