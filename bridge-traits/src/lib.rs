//! # Host Bridge Traits
//!
//! Capability contracts the streaming core needs from the host platform.
//!
//! ## Overview
//!
//! The core never talks to an audio device or a logging backend directly.
//! Each of those concerns is a trait defined here and implemented per platform
//! (desktop implementations live in `bridge-desktop`).
//!
//! ## Traits
//!
//! ### Audio output
//! - [`AudioSink`](playback::AudioSink) - Accepts 16-bit PCM, reports buffer capacity,
//!   starts playback on request
//! - [`StreamObserver`](playback::StreamObserver) - Buffering and failure notifications
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert their native errors into it and keep the
//! message actionable (device name, path, requested format).
//!
//! ## Thread Safety
//!
//! An [`AudioSink`](playback::AudioSink) is owned by the decoding thread, so it only
//! needs `Send`. Observers and logger sinks are shared between the producer and
//! consumer threads and must be `Send + Sync`.
//!
//! ## Examples
//!
//! ### Implementing AudioSink
//!
//! ```ignore
//! use bridge_traits::error::Result;
//! use bridge_traits::playback::AudioSink;
//!
//! struct DeviceSink { track: NativeTrack }
//!
//! impl AudioSink for DeviceSink {
//!     fn notify_format_changed(&mut self, sample_rate: u32, channels: u16) -> Result<()> {
//!         self.track.reopen(sample_rate, channels)
//!     }
//!     fn write_samples(&mut self, samples: &[i16]) -> Result<usize> {
//!         self.track.write(samples)
//!     }
//!     fn start_playback(&mut self) -> Result<()> {
//!         self.track.play()
//!     }
//!     fn buffer_capacity_bytes(&self) -> Result<usize> {
//!         Ok(self.track.buffer_bytes())
//!     }
//! }
//! ```

pub mod error;
pub mod logging;
pub mod playback;

pub use error::BridgeError;

// Re-export commonly used types
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{AudioSink, NoopObserver, StreamObserver};
