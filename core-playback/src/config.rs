//! # Streaming Configuration
//!
//! Configuration, state and statistics types for the streaming session.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lowest bitrate used when sizing the ring buffer.
pub const MIN_SIZING_BITRATE_KBPS: u32 = 64;

/// Highest bitrate used when sizing the ring buffer.
pub const MAX_SIZING_BITRATE_KBPS: u32 = 320;

/// Ring buffer size for a stream of `kbps` kilobits per second.
///
/// Three quarters of a second worth of KiB-based bitrate, with the bitrate
/// clamped to `[64, 320]` kbps.
pub fn buffer_size_for_bitrate(kbps: u32) -> usize {
    let kbps = kbps.clamp(MIN_SIZING_BITRATE_KBPS, MAX_SIZING_BITRATE_KBPS) as usize;
    kbps * 1024 * 3 / 4
}

/// Streaming session configuration.
///
/// Every field has a serde default, so hosts can send partial JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Ring buffer storage size in bytes (usable capacity is one less).
    ///
    /// Default: `buffer_size_for_bitrate(128)` = 98 304 bytes.
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,

    /// Maximum bytes offered to the decoder per input call.
    ///
    /// Must be at least the engine's
    /// [`min_input_bytes`](crate::engine::DecoderEngine::min_input_bytes),
    /// checked when a session starts. Default: 3072.
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,

    /// Share of the sink buffer (in percent) that must be written before
    /// playback starts.
    ///
    /// Default: 85.
    #[serde(default = "default_start_threshold_percent")]
    pub start_threshold_percent: u8,

    /// Sleep between checks while the decoder waits for data.
    ///
    /// Default: 300 µs.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Give up after this many consecutive wait polls. `None` waits until
    /// the stream ends, fails, or is cancelled.
    ///
    /// Default: `None`.
    #[serde(default)]
    pub max_wait_polls: Option<u32>,

    /// Bytes requested from the source per read.
    ///
    /// Default: 4096.
    #[serde(default = "default_producer_chunk_bytes")]
    pub producer_chunk_bytes: usize,

    /// How long a finished session waits for the producer thread to exit.
    /// A producer still blocked in a source read after that is detached.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_producer_join_timeout")]
    pub producer_join_timeout: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            ring_capacity: default_ring_capacity(),
            max_chunk_bytes: default_max_chunk_bytes(),
            start_threshold_percent: default_start_threshold_percent(),
            poll_interval: default_poll_interval(),
            max_wait_polls: None,
            producer_chunk_bytes: default_producer_chunk_bytes(),
            producer_join_timeout: default_producer_join_timeout(),
        }
    }
}

impl StreamingConfig {
    /// Default configuration with the ring sized for `kbps`.
    pub fn for_bitrate(kbps: u32) -> Self {
        Self {
            ring_capacity: buffer_size_for_bitrate(kbps),
            ..Default::default()
        }
    }

    /// Parse a (possibly partial) JSON configuration and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PlaybackError::InvalidConfig(format!("Malformed JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_bytes == 0 {
            return Err(PlaybackError::InvalidConfig(
                "max_chunk_bytes must be > 0".to_string(),
            ));
        }

        // The feed requires max_chunk_bytes + 1 contiguous bytes below capacity
        if self.ring_capacity < self.max_chunk_bytes + 2 {
            return Err(PlaybackError::InvalidConfig(format!(
                "ring_capacity ({}) must be at least max_chunk_bytes + 2 ({})",
                self.ring_capacity,
                self.max_chunk_bytes + 2
            )));
        }

        if !(1..=100).contains(&self.start_threshold_percent) {
            return Err(PlaybackError::InvalidConfig(
                "start_threshold_percent must be between 1 and 100".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(PlaybackError::InvalidConfig(
                "poll_interval must be > 0".to_string(),
            ));
        }

        if self.producer_chunk_bytes == 0 {
            return Err(PlaybackError::InvalidConfig(
                "producer_chunk_bytes must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Check `max_chunk_bytes` against the smallest input an engine can
    /// make progress on.
    pub fn validate_for_engine(&self, min_input_bytes: usize) -> Result<()> {
        if self.max_chunk_bytes < min_input_bytes {
            return Err(PlaybackError::InvalidConfig(format!(
                "max_chunk_bytes ({}) is below the decoder's minimum input of {} bytes",
                self.max_chunk_bytes, min_input_bytes
            )));
        }
        Ok(())
    }
}

fn default_ring_capacity() -> usize {
    buffer_size_for_bitrate(128)
}

fn default_max_chunk_bytes() -> usize {
    3072
}

fn default_start_threshold_percent() -> u8 {
    85
}

fn default_poll_interval() -> Duration {
    Duration::from_micros(300)
}

fn default_producer_chunk_bytes() -> usize {
    4096
}

fn default_producer_join_timeout() -> Duration {
    Duration::from_millis(500)
}

// ============================================================================
// State & Statistics
// ============================================================================

/// Current state of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamingState {
    /// No session running.
    Idle,
    /// Decoding, sink not started yet (or waiting for data).
    Buffering,
    /// Playback was started on the sink.
    Playing,
    /// Stream ended normally.
    Completed,
    /// Stopped through the cancel flag.
    Cancelled,
    /// Ended on a fatal error.
    Failed,
}

impl StreamingState {
    /// Returns `true` while a session is running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Buffering | Self::Playing)
    }

    /// Returns `true` once a session has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Counters collected over one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingStats {
    /// Bytes the producer stored in the ring buffer.
    pub bytes_received: u64,
    /// Frames delivered to the output pipeline.
    pub frames_decoded: u64,
    /// Recoverable per-frame decode errors.
    pub frame_errors: u64,
    /// Times the decoder's resume position was behind the read cursor, plus
    /// bitstream sync losses reported by the decoder.
    pub sync_losses: u64,
    /// Ring buffer realignments performed by the feed.
    pub realignments: u64,
    /// Times the decoder had to wait for stream data.
    pub starvation_waits: u64,
    /// PCM bytes offered to the sink.
    pub pcm_bytes_written: u64,
    /// Sink writes that accepted fewer bytes than offered.
    pub short_writes: u64,
    /// Whether `start_playback` succeeded.
    pub playback_started: bool,
}
