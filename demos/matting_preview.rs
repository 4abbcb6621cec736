//! Run the matting pipeline against the local camera without a room
//!
//! Usage:
//!   matting_preview <model.onnx> [background.png]
//!
//! Captures a few seconds of camera video, replaces the background (a
//! solid green fill when no image is given) and reports pipeline timing.

use anyhow::{bail, Result};
use std::path::Path;
use tracing_subscriber::EnvFilter;
use veilcam::{
    Background, CameraConfig, MattingModel, MattingPipeline, PipelineConfig,
};
use veilcam_media::capture::NokhwaCamera;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        bail!("usage: {} <model.onnx> [background.png]", args[0]);
    }

    let config = PipelineConfig {
        width: 480,
        height: 320,
        framerate: 30.0,
        camera: CameraConfig::default(),
    };
    let background = match args.get(2) {
        Some(path) => Background::from_image_path(Path::new(path), config.width, config.height)?,
        None => Background::solid(config.width, config.height, [0, 177, 64, 255]),
    };
    let model = MattingModel::load(Path::new(&args[1]))?;

    let (pipeline, mut frames) =
        MattingPipeline::start(Box::new(NokhwaCamera::new()), Box::new(model), background, config)?;
    println!("Pipeline running, capturing 100 frames");

    let mut received = 0u32;
    while received < 100 {
        match frames.recv().await {
            Some(frame) => {
                received += 1;
                if received % 25 == 0 {
                    println!(
                        "Frame {} ({}x{} at {} ms)",
                        received, frame.width, frame.height, frame.timestamp_ms
                    );
                }
            }
            None => bail!("pipeline stopped early"),
        }
    }

    let stats = pipeline.stats();
    println!(
        "Done: {} processed, {} dropped, {:.1} ms average inference",
        stats.frames_processed, stats.frames_dropped, stats.avg_inference_ms
    );
    Ok(())
}
