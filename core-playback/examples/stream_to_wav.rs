//! # Stream an MP3 File to WAV
//!
//! Plays a local MP3 file as if it were a live stream: the file is read at
//! its bitrate through `PacedReader`, decoded by `MpegFrameEngine` and
//! written to a WAV file by `WavFileSink`.
//!
//! Run with:
//! `cargo run --example stream_to_wav --package core-playback -- in.mp3 out.wav [kbps] [seconds]`
//!
//! `seconds` cancels the session after that long.

use anyhow::{bail, Context};
use bridge_desktop::{PacedReader, WavFileSink};
use bridge_traits::{LogLevel, StreamObserver};
use core_playback::{MpegFrameEngine, StreamingConfig, StreamingService};
use core_runtime::config::CoreConfig;
use core_runtime::logging::{LogFormat, LoggingConfig};
use std::fs::File;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct PrintObserver;

impl StreamObserver for PrintObserver {
    fn on_buffering(&self, is_buffering: bool) {
        println!("buffering: {}", is_buffering);
    }

    fn on_stream_error(&self, message: &str) {
        eprintln!("stream error: {}", message);
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        bail!("usage: {} <input.mp3> <output.wav> [kbps] [seconds]", args[0]);
    }
    let kbps: u32 = match args.get(3) {
        Some(arg) => arg.parse().context("kbps must be a number")?,
        None => 128,
    };
    let stop_after: Option<u64> = args
        .get(4)
        .map(|arg| arg.parse())
        .transpose()
        .context("seconds must be a number")?;

    let core = CoreConfig::builder()
        .audio_sink(Box::new(WavFileSink::new(&args[2])))
        .observer(Arc::new(PrintObserver))
        .logging(
            LoggingConfig::default()
                .with_format(LogFormat::Compact)
                .with_level(LogLevel::Debug),
        )
        .build()?;
    core.init_logging()?;

    let input = File::open(&args[1]).with_context(|| format!("cannot open {}", args[1]))?;
    // Deliver a little faster than real time so the ring stays ahead
    let source = PacedReader::for_bitrate(input, kbps + kbps / 4);

    let (service, sink) = StreamingService::from_core_config(StreamingConfig::for_bitrate(kbps), core)?;

    if let Some(seconds) = stop_after {
        let cancel = service.cancel_flag();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(seconds));
            cancel.cancel();
        });
    }

    let report = service.run(source, MpegFrameEngine::new(), sink)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
