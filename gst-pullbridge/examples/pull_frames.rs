// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! Pulls frames from an `appsink` and prints their format and timestamps.
//!
//! ```text
//! cargo run --example pull_frames -- --count 5 \
//!     "videotestsrc ! video/x-raw,format=BGRA,width=640,height=360 ! appsink name=sink"
//! ```

mod common;

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use futures::{FutureExt, StreamExt, executor::block_on};
use gstpullbridge::Pipeline;
use pullbridge::{BusMessage, MessagePumpConfig, PumpConfig};
use tracing::{info, level_filters::LevelFilter, warn};

#[derive(Debug, Parser)]
#[command(version, about = "Pull frames from a GStreamer appsink")]
struct Args {
    /// Pipeline description containing an appsink.
    #[arg(
        default_value = "videotestsrc num-buffers=30 ! video/x-raw,format=BGRA,width=640,height=360 ! appsink name=sink"
    )]
    pipeline: String,

    /// Name of the appsink element.
    #[arg(long, default_value = "sink")]
    sink: String,

    /// Stop after this many frames.
    #[arg(long, default_value_t = 10)]
    count: usize,

    /// Pump configuration as JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the pull timeout from the configuration.
    #[arg(long, env = "PULLBRIDGE_PULL_TIMEOUT_MS")]
    pull_timeout_ms: Option<u64>,

    /// Seek here before pulling.
    #[arg(long)]
    seek_ms: Option<u64>,
}

fn load_config(args: &Args) -> Result<PumpConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => PumpConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => PumpConfig::default(),
    };
    if let Some(timeout) = args.pull_timeout_ms {
        config = config.with_pull_timeout(Duration::from_millis(timeout));
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    common::setup_logging(LevelFilter::INFO);
    let args = Args::parse();
    let config = load_config(&args)?;

    gstpullbridge::init()?;
    let pipeline = Pipeline::launch(&args.pipeline)?;
    let mut messages = pipeline.messages(MessagePumpConfig::default())?;
    let mut frames = pipeline.sample_stream(&args.sink, config)?;
    pipeline.play()?;

    if let Some(seek_ms) = args.seek_ms {
        pipeline.state(Some(Duration::from_secs(5)))?;
        pipeline.seek(
            Duration::from_millis(seek_ms),
            gstreamer::SeekFlags::FLUSH | gstreamer::SeekFlags::KEY_UNIT,
        )?;
    }

    let mut pulled = 0;
    while pulled < args.count {
        let Some(frame) = block_on(frames.next()) else {
            info!("End of stream");
            break;
        };
        pulled += 1;
        let checksum = frame
            .buffer()
            .with_bytes(|bytes| bytes.iter().fold(0u32, |acc, b| acc.wrapping_add(u32::from(*b))))?;
        info!(
            pts = ?frame.pts(),
            duration = ?frame.duration(),
            bytes = frame.buffer().len(),
            checksum,
            format = ?frame.format(),
            "Frame {pulled}"
        );

        while let Some(Some(message)) = messages.next().now_or_never() {
            match message {
                BusMessage::Error { message, debug, .. } => warn!(?debug, "Pipeline error: {message}"),
                BusMessage::Warning { message, .. } => warn!("Pipeline warning: {message}"),
                other => info!(?other, "Bus message"),
            }
        }
    }
    frames.cancel();

    info!(
        position = ?pipeline.position(),
        duration = ?pipeline.duration(),
        format = ?frames.format(),
        "Pulled {pulled} frame(s)"
    );
    Ok(())
}
