//! MP3 network streamer.
//!
//! Façade over the workspace crates. Host applications can depend on
//! `mp3-streamer-workspace` and enable the documented features without
//! wiring each crate individually:
//!
//! - `decoder-mp3` (default): the symphonia-backed `MpegFrameEngine`
//! - `desktop-shims` (default): `bridge-desktop` sinks and sources

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;

pub use bridge_traits::{AudioSink, BridgeError, NoopObserver, StreamObserver};
pub use core_playback::{
    CancelFlag, DecoderEngine, PlaybackError, SessionOutcome, SessionReport, StreamingConfig,
    StreamingService, StreamingState, StreamingStats,
};
pub use core_runtime::config::CoreConfig;

#[cfg(feature = "decoder-mp3")]
pub use core_playback::MpegFrameEngine;
