//! Matting pipeline
//!
//! Two worker threads connected by a bounded channel: the capture thread
//! pulls RGBA frames from the camera at the configured framerate, the
//! inference thread runs the matting engine and the compositor. While
//! inference is busy the slot between the threads holds exactly one frame,
//! and a newer capture evicts the older one.

use crate::background::{Background, Compositor};
use crate::capture::{CameraBackend, CameraConfig};
use crate::error::MediaError;
use crate::frames::VideoFrame;
use crate::matting::MattingEngine;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Processed frames that may queue up before the pipeline drops new ones
const OUTPUT_QUEUE_DEPTH: usize = 4;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Processing width; camera frames are scaled to this before inference
    pub width: u32,
    /// Processing height
    pub height: u32,
    /// Target framerate of the processed stream
    pub framerate: f64,
    /// Camera configuration
    pub camera: CameraConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 320,
            framerate: 30.0,
            camera: CameraConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), MediaError> {
        if self.width == 0 || self.height == 0 {
            return Err(MediaError::InvalidConfiguration {
                message: "Invalid processing resolution".to_string(),
            });
        }
        if self.framerate <= 0.0 || self.framerate > 120.0 {
            return Err(MediaError::InvalidConfiguration {
                message: "Invalid framerate".to_string(),
            });
        }
        self.camera.validate()
    }
}

/// Pipeline statistics
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Frames captured, inferred and composited
    pub frames_processed: u64,
    /// Frames dropped because inference or the consumer was behind
    pub frames_dropped: u64,
    /// Average inference time in milliseconds
    pub avg_inference_ms: f64,
}

#[derive(Default)]
struct StatsInner {
    frames_processed: u64,
    frames_dropped: u64,
    inference_total: Duration,
}

/// Running matting pipeline
pub struct MattingPipeline {
    running: Arc<AtomicBool>,
    stats: Arc<Mutex<StatsInner>>,
    capture_worker: Option<std::thread::JoinHandle<()>>,
    inference_worker: Option<std::thread::JoinHandle<()>>,
}

impl std::fmt::Debug for MattingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MattingPipeline")
            .field("running", &self.is_running())
            .finish()
    }
}

impl MattingPipeline {
    /// Start the pipeline
    ///
    /// Takes ownership of the camera backend, the matting engine and the
    /// background; returns the pipeline handle and the processed-frame
    /// receiver.
    pub fn start(
        mut camera: Box<dyn CameraBackend>,
        mut engine: Box<dyn MattingEngine>,
        background: Background,
        config: PipelineConfig,
    ) -> Result<(Self, mpsc::Receiver<VideoFrame>), MediaError> {
        config.validate()?;
        if background.width() != config.width || background.height() != config.height {
            return Err(MediaError::DimensionMismatch {
                expected_width: config.width,
                expected_height: config.height,
                actual_width: background.width(),
                actual_height: background.height(),
            });
        }

        camera.open(&config.camera)?;
        camera.start()?;

        // One frame in flight between capture and inference
        let (raw_tx, raw_rx) = crossbeam_channel::bounded::<VideoFrame>(1);
        let (frame_tx, frame_rx) = mpsc::channel::<VideoFrame>(OUTPUT_QUEUE_DEPTH);
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(Mutex::new(StatsInner::default()));

        let frame_interval = Duration::from_secs_f64(1.0 / config.framerate);
        let (proc_w, proc_h) = (config.width, config.height);

        let capture_running = running.clone();
        let capture_stats = stats.clone();
        let stale_rx = raw_rx.clone();
        let capture_worker = std::thread::Builder::new()
            .name("veilcam-capture".to_string())
            .spawn(move || {
                info!(
                    "Capture started ({}x{} @ {:.0} fps)",
                    proc_w,
                    proc_h,
                    1.0 / frame_interval.as_secs_f64()
                );
                while capture_running.load(Ordering::Acquire) {
                    let tick = Instant::now();
                    match camera.next_frame() {
                        Ok(frame) => {
                            let scaled = scale_to(&frame, proc_w, proc_h);
                            match raw_tx.try_send(scaled) {
                                Ok(()) => {}
                                Err(crossbeam_channel::TrySendError::Full(fresh)) => {
                                    // Inference still busy; evict the stale
                                    // frame so it always sees the newest
                                    let _ = stale_rx.try_recv();
                                    capture_stats.lock().frames_dropped += 1;
                                    match raw_tx.try_send(fresh) {
                                        Ok(()) | Err(crossbeam_channel::TrySendError::Full(_)) => {}
                                        Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                                            break
                                        }
                                    }
                                }
                                Err(crossbeam_channel::TrySendError::Disconnected(_)) => break,
                            }
                        }
                        Err(e) => {
                            warn!("Camera frame failed: {}", e);
                            if !e.is_recoverable() {
                                break;
                            }
                        }
                    }
                    let elapsed = tick.elapsed();
                    if elapsed < frame_interval {
                        std::thread::sleep(frame_interval - elapsed);
                    }
                }
                if let Err(e) = camera.stop() {
                    warn!("Camera stop failed: {}", e);
                }
                capture_running.store(false, Ordering::Release);
                debug!("Capture thread finished");
            })
            .map_err(|e| MediaError::InvalidState {
                message: format!("failed to spawn capture worker: {}", e),
            })?;

        let infer_running = running.clone();
        let infer_stats = stats.clone();
        let compositor = Compositor::new();
        let inference_worker = std::thread::Builder::new()
            .name("veilcam-matting".to_string())
            .spawn(move || {
                // recv with a timeout so the stop flag is observed even
                // when the capture side stalls
                loop {
                    if !infer_running.load(Ordering::Acquire) {
                        break;
                    }
                    let frame = match raw_rx.recv_timeout(Duration::from_millis(100)) {
                        Ok(frame) => frame,
                        Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                        Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                    };

                    let infer_start = Instant::now();
                    let matte = match engine.infer(&frame) {
                        Ok(matte) => matte,
                        Err(e) => {
                            warn!("Inference failed: {}", e);
                            continue;
                        }
                    };
                    let infer_elapsed = infer_start.elapsed();

                    let composited =
                        match compositor.composite(&matte, &background, frame.timestamp_ms) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!("Compositing failed: {}", e);
                                continue;
                            }
                        };

                    let mut stats = infer_stats.lock();
                    stats.inference_total += infer_elapsed;
                    match frame_tx.try_send(composited) {
                        Ok(()) => stats.frames_processed += 1,
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            stats.frames_dropped += 1;
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            debug!("Output consumer gone, stopping pipeline");
                            break;
                        }
                    }
                }
                infer_running.store(false, Ordering::Release);
                debug!("Inference thread finished");
            })
            .map_err(|e| MediaError::InvalidState {
                message: format!("failed to spawn inference worker: {}", e),
            })?;

        Ok((
            Self {
                running,
                stats,
                capture_worker: Some(capture_worker),
                inference_worker: Some(inference_worker),
            },
            frame_rx,
        ))
    }

    /// Whether the loop is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Current statistics snapshot
    pub fn stats(&self) -> PipelineStats {
        let inner = self.stats.lock();
        let avg_inference_ms = if inner.frames_processed > 0 {
            inner.inference_total.as_secs_f64() * 1000.0 / inner.frames_processed as f64
        } else {
            0.0
        };
        PipelineStats {
            frames_processed: inner.frames_processed,
            frames_dropped: inner.frames_dropped,
            avg_inference_ms,
        }
    }

    /// Stop both workers and join them, stopping the camera
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.capture_worker.take() {
            let _ = worker.join();
        }
        if let Some(worker) = self.inference_worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for MattingPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Nearest-neighbor scale to the processing resolution
///
/// Returns the input unchanged when it already matches.
pub fn scale_to(frame: &VideoFrame, width: u32, height: u32) -> VideoFrame {
    if frame.width == width && frame.height == height {
        return frame.clone();
    }
    let x_ratio = frame.width as f32 / width as f32;
    let y_ratio = frame.height as f32 / height as f32;
    let mut data = vec![0u8; (width * height * 4) as usize];
    for y in 0..height {
        for x in 0..width {
            let src_x = ((x as f32 * x_ratio) as u32).min(frame.width - 1);
            let src_y = ((y as f32 * y_ratio) as u32).min(frame.height - 1);
            let src = ((src_y * frame.width + src_x) * 4) as usize;
            let dst = ((y * width + x) * 4) as usize;
            data[dst..dst + 4].copy_from_slice(&frame.data[src..src + 4]);
        }
    }
    VideoFrame {
        width,
        height,
        data,
        timestamp_ms: frame.timestamp_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_passthrough_keeps_buffer() {
        let frame = VideoFrame::new(2, 2, vec![7u8; 16], 5).unwrap();
        let same = scale_to(&frame, 2, 2);
        assert_eq!(same.data, frame.data);
        assert_eq!(same.timestamp_ms, 5);
    }

    #[test]
    fn scale_downsamples() {
        // 2x2 frame, distinct corners
        let mut data = vec![0u8; 16];
        data[0] = 10; // (0,0)
        data[12] = 99; // (1,1)
        let frame = VideoFrame::new(2, 2, data, 0).unwrap();
        let scaled = scale_to(&frame, 1, 1);
        assert_eq!(scaled.width, 1);
        assert_eq!(scaled.data.len(), 4);
        assert_eq!(scaled.data[0], 10);
    }

    #[test]
    fn config_rejects_zero_framerate() {
        let config = PipelineConfig {
            framerate: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
