//! Join a room and publish the background-replaced camera feed
//!
//! Usage:
//!   join_room <service-url> <token> <model.onnx> <background.png>
//!
//! Joins the room behind the token, publishes the processed camera and the
//! microphone together, plays remote audio, and prints room events until
//! Ctrl-C.

use anyhow::{bail, Result};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use veilcam::{BufferedVideoSink, VeilCam};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 5 {
        bail!("usage: {} <service-url> <token> <model.onnx> <background.png>", args[0]);
    }

    let veilcam = VeilCam::init()?;
    let mut room = veilcam
        .room(&args[1])
        .token(&args[2])
        .model(&args[3])
        .background(&args[4])
        .join()
        .await?;
    println!("Joined room {} as {}", room.id(), room.participant_id());

    let (audio, video) = room.publish_media().await?;
    println!("Publishing audio {} and video {}", audio.id(), video.id());

    room.set_video_sink(Box::new(BufferedVideoSink::default()));
    if let Err(e) = room.play_remote_audio() {
        println!("Remote audio playback unavailable: {}", e);
    }

    let mut events = room.events();
    let mut stats_tick = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => println!("Event: {:?}", event),
                None => break,
            },
            _ = stats_tick.tick() => {
                if let Some(stats) = room.pipeline_stats() {
                    println!(
                        "Pipeline: {} processed, {} dropped, {:.1} ms/frame",
                        stats.frames_processed, stats.frames_dropped, stats.avg_inference_ms
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Leaving room");
                break;
            }
        }
    }

    room.leave().await?;
    Ok(())
}
