//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides implementations of the host contracts suitable for
//! running the streamer without a sound device:
//! - `AudioSink` as `WavFileSink`, writing 16-bit WAV files via `hound`
//! - `PacedReader`, a `Read` adapter that turns a local file into a
//!   rate-limited byte source resembling a live stream
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{PacedReader, WavFileSink};
//! use std::fs::File;
//!
//! let source = PacedReader::for_bitrate(File::open("song.mp3")?, 128);
//! let sink = WavFileSink::new("song.wav");
//!
//! // Hand both to core_playback::StreamingService::run
//! ```

mod paced_reader;
mod wav_sink;

pub use paced_reader::PacedReader;
pub use wav_sink::{WavFileSink, DEFAULT_BUFFER_CAPACITY};
