//! Media layer tests that run without camera hardware or a model file

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use veilcam_media::{
    AudioFrame, Background, CameraBackend, CameraConfig, Compositor, MatteOutput, MattingEngine,
    MattingPipeline, MediaError, PipelineConfig, TestPatternCamera, VideoFrame,
};

/// Test-pattern camera that mirrors its stream state into a shared flag,
/// observable after the pipeline takes ownership
struct FlaggedCamera {
    inner: TestPatternCamera,
    streaming: Arc<AtomicBool>,
}

impl CameraBackend for FlaggedCamera {
    fn open(&mut self, config: &CameraConfig) -> Result<(), MediaError> {
        self.inner.open(config)
    }

    fn start(&mut self) -> Result<(), MediaError> {
        self.inner.start()?;
        self.streaming.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<VideoFrame, MediaError> {
        self.inner.next_frame()
    }

    fn stop(&mut self) -> Result<(), MediaError> {
        self.inner.stop()?;
        self.streaming.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.inner.is_streaming()
    }
}

/// Camera that stamps each frame with a capture sequence number
struct CountingCamera {
    config: CameraConfig,
    streaming: bool,
    captured: Arc<AtomicU64>,
}

impl CameraBackend for CountingCamera {
    fn open(&mut self, config: &CameraConfig) -> Result<(), MediaError> {
        self.config = config.clone();
        Ok(())
    }

    fn start(&mut self) -> Result<(), MediaError> {
        self.streaming = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<VideoFrame, MediaError> {
        let seq = self.captured.fetch_add(1, Ordering::SeqCst);
        let (w, h) = (self.config.width, self.config.height);
        VideoFrame::new(w, h, vec![128u8; (w * h * 4) as usize], seq)
    }

    fn stop(&mut self) -> Result<(), MediaError> {
        self.streaming = false;
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }
}

fn identity_matte(frame: &VideoFrame) -> MatteOutput {
    let plane = (frame.width * frame.height) as usize;
    let mut fgr = vec![0.0f32; plane * 3];
    for i in 0..plane {
        fgr[i] = frame.data[i * 4] as f32 / 255.0;
        fgr[plane + i] = frame.data[i * 4 + 1] as f32 / 255.0;
        fgr[2 * plane + i] = frame.data[i * 4 + 2] as f32 / 255.0;
    }
    MatteOutput {
        fgr,
        pha: vec![1.0; plane],
        width: frame.width,
        height: frame.height,
    }
}

/// Fully opaque pass-through engine
struct IdentityMatte;

impl MattingEngine for IdentityMatte {
    fn infer(&mut self, frame: &VideoFrame) -> Result<MatteOutput, MediaError> {
        Ok(identity_matte(frame))
    }
}

/// Engine that records how far behind the capture counter each inferred
/// frame was, then simulates slow inference
struct SlowMatte {
    captured: Arc<AtomicU64>,
    staleness: Arc<Mutex<Vec<u64>>>,
}

impl MattingEngine for SlowMatte {
    fn infer(&mut self, frame: &VideoFrame) -> Result<MatteOutput, MediaError> {
        let newest = self.captured.load(Ordering::SeqCst).saturating_sub(1);
        self.staleness
            .lock()
            .unwrap()
            .push(newest.saturating_sub(frame.timestamp_ms));
        std::thread::sleep(Duration::from_millis(60));
        Ok(identity_matte(frame))
    }
}

fn pipeline_config(width: u32, height: u32, framerate: f64) -> PipelineConfig {
    PipelineConfig {
        width,
        height,
        framerate,
        camera: CameraConfig {
            width,
            height,
            framerate,
            device_index: None,
        },
    }
}

#[test]
fn pipeline_flows_frames_and_stop_releases_the_camera() {
    let streaming = Arc::new(AtomicBool::new(false));
    let camera = FlaggedCamera {
        inner: TestPatternCamera::new(),
        streaming: streaming.clone(),
    };
    let config = pipeline_config(16, 8, 60.0);
    let background = Background::solid(16, 8, [0, 0, 255, 255]);

    let (mut pipeline, mut frames) = MattingPipeline::start(
        Box::new(camera),
        Box::new(IdentityMatte),
        background,
        config,
    )
    .unwrap();
    assert!(streaming.load(Ordering::SeqCst));

    for _ in 0..3 {
        let frame = frames.blocking_recv().unwrap();
        assert_eq!(frame.width, 16);
        assert_eq!(frame.height, 8);
        // pha of 1.0 keeps the camera foreground opaque
        assert_eq!(frame.data[3], 255);
    }
    assert!(pipeline.stats().frames_processed >= 3);

    pipeline.stop();
    assert!(!pipeline.is_running());
    assert!(!streaming.load(Ordering::SeqCst));
}

#[test]
fn busy_inference_keeps_the_newest_frame() {
    let captured = Arc::new(AtomicU64::new(0));
    let staleness = Arc::new(Mutex::new(Vec::new()));
    let camera = CountingCamera {
        config: CameraConfig::default(),
        streaming: false,
        captured: captured.clone(),
    };
    let engine = SlowMatte {
        captured: captured.clone(),
        staleness: staleness.clone(),
    };
    let config = pipeline_config(8, 8, 100.0);
    let background = Background::solid(8, 8, [0, 0, 0, 255]);

    let (mut pipeline, mut frames) =
        MattingPipeline::start(Box::new(camera), Box::new(engine), background, config).unwrap();

    // Capture runs every 10ms, inference takes 60ms: most frames must be
    // dropped, and each inference should still see a recent capture
    let mut timestamps = Vec::new();
    for _ in 0..5 {
        timestamps.push(frames.blocking_recv().unwrap().timestamp_ms);
    }
    let stats = pipeline.stats();
    pipeline.stop();

    assert!(stats.frames_dropped > 0, "expected drops, got {:?}", stats);
    assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
    let recorded = staleness.lock().unwrap();
    for &lag in recorded.iter().skip(1) {
        assert!(lag <= 3, "inference ran {} captures behind", lag);
    }
}

#[test]
fn test_pattern_camera_lifecycle() {
    let mut camera = TestPatternCamera::new();
    let config = CameraConfig {
        width: 64,
        height: 48,
        framerate: 30.0,
        device_index: None,
    };

    camera.open(&config).unwrap();
    assert!(!camera.is_streaming());

    // Frames before start are an error
    assert!(matches!(
        camera.next_frame(),
        Err(MediaError::CaptureNotActive)
    ));

    camera.start().unwrap();
    assert!(camera.is_streaming());

    let frame = camera.next_frame().unwrap();
    assert_eq!(frame.width, 64);
    assert_eq!(frame.height, 48);
    assert_eq!(frame.data.len(), 64 * 48 * 4);

    camera.stop().unwrap();
    assert!(!camera.is_streaming());
}

#[test]
fn camera_config_validation_catches_bad_values() {
    let zero = CameraConfig {
        width: 0,
        height: 240,
        framerate: 30.0,
        device_index: None,
    };
    assert!(zero.validate().is_err());

    let bad_fps = CameraConfig {
        width: 320,
        height: 240,
        framerate: -1.0,
        device_index: None,
    };
    assert!(bad_fps.validate().is_err());

    assert!(CameraConfig::default().validate().is_ok());
}

#[test]
fn compositing_a_synthetic_matte_replaces_the_backdrop() {
    // 2x2 matte: left column fully opaque person, right column transparent
    let matte = MatteOutput {
        fgr: vec![
            1.0, 0.0, 1.0, 0.0, // R plane
            0.0, 0.0, 0.0, 0.0, // G plane
            0.0, 0.0, 0.0, 0.0, // B plane
        ],
        pha: vec![1.0, 0.0, 1.0, 0.0],
        width: 2,
        height: 2,
    };
    let background = Background::solid(2, 2, [0, 0, 255, 255]);

    let frame = Compositor::new()
        .composite(&matte, &background, 123)
        .unwrap();
    assert_eq!(frame.timestamp_ms, 123);

    // Opaque pixel keeps the model foreground (red)
    assert_eq!(&frame.data[0..4], &[255, 0, 0, 255]);
    // Transparent pixel takes the whole background pixel (blue)
    assert_eq!(&frame.data[4..8], &[0, 0, 255, 255]);
}

#[test]
fn background_rejects_wrong_buffer_size() {
    assert!(Background::from_rgba(2, 2, vec![0u8; 3]).is_err());
    assert!(Background::from_rgba(2, 2, vec![0u8; 16]).is_ok());
}

#[test]
fn audio_samples_survive_the_wire_encoding() {
    let frame = AudioFrame {
        samples: vec![0.0, 0.5, -0.5, 1.0],
        sample_rate: 48_000,
        channels: 1,
        timestamp_ms: 0,
    };
    let bytes = frame.to_le_bytes();
    assert_eq!(bytes.len(), 16);
    let decoded = AudioFrame::samples_from_le_bytes(&bytes);
    assert_eq!(decoded, frame.samples);
}

#[test]
fn audio_frame_duration_accounts_for_channels() {
    let frame = AudioFrame {
        samples: vec![0.0; 960 * 2],
        sample_rate: 48_000,
        channels: 2,
        timestamp_ms: 0,
    };
    assert_eq!(frame.duration(), std::time::Duration::from_millis(20));
}

#[test]
fn video_frame_checks_dimensions() {
    assert!(VideoFrame::new(2, 2, vec![0u8; 16], 0).is_ok());
    assert!(matches!(
        VideoFrame::new(2, 2, vec![0u8; 15], 0),
        Err(MediaError::InvalidFrameData {
            expected: 16,
            actual: 15
        })
    ));
}
