//! # Playback Error Types
//!
//! Error types for the streaming pipeline: ring buffer, producer, decoder
//! callbacks and sink.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur while streaming.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Buffer Errors
    // ========================================================================
    /// Memory for the ring storage or a realignment scratch copy could not be
    /// obtained.
    #[error("Failed to allocate {bytes} bytes")]
    Allocation { bytes: usize },

    /// A ring buffer needs at least two bytes of storage.
    #[error("Invalid ring buffer capacity: {0}")]
    InvalidCapacity(usize),

    /// More contiguous bytes were requested than the ring can ever hold.
    #[error("Contiguous read of {requested} bytes exceeds ring capacity {capacity}")]
    ContiguousReadTooLarge { requested: usize, capacity: usize },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Streaming configuration failed validation.
    #[error("Invalid streaming configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Source Errors
    // ========================================================================
    /// The producer could not read from its byte source.
    #[error("Stream source failed: {0}")]
    SourceFailed(String),

    /// The consumer waited the configured number of polls without new data.
    #[error("No stream data after {attempts} wait polls")]
    RetriesExhausted { attempts: u32 },

    // ========================================================================
    // Output Errors
    // ========================================================================
    /// The audio sink rejected a call.
    #[error("Audio sink error: {0}")]
    Sink(#[from] BridgeError),

    /// A decoded frame does not fit into the sink's playback buffer.
    #[error("Decoded frame of {bytes} bytes exceeds sink buffer of {capacity} bytes")]
    FrameTooLarge { bytes: usize, capacity: usize },

    /// Only mono and stereo output is supported.
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(u16),

    // ========================================================================
    // Decoder Errors
    // ========================================================================
    /// Decoder engine failed outside of a recoverable per-frame error.
    #[error("Decoder error: {0}")]
    DecoderError(String),

    /// The decoder consumed nothing of a view that was already as large as
    /// the feed ever offers.
    #[error("Decoder made no progress on a full {chunk}-byte input chunk")]
    NoProgress { chunk: usize },

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if restarting the session may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::SourceFailed(_)
                | PlaybackError::RetriesExhausted { .. }
                | PlaybackError::Allocation { .. }
                | PlaybackError::Io(_)
        )
    }

    /// Returns `true` if the failure originated on the producer side.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::SourceFailed(_) | PlaybackError::RetriesExhausted { .. }
        )
    }

    /// Returns `true` if the failure originated in the audio sink.
    pub fn is_sink_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::Sink(_)
                | PlaybackError::FrameTooLarge { .. }
                | PlaybackError::UnsupportedChannels(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
