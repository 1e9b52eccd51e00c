//! # Playback & Streaming Module
//!
//! Streams a compressed MPEG audio byte source through a decoder into a
//! host audio sink.
//!
//! ## Overview
//!
//! This module handles:
//! - A byte ring buffer shared between the network producer and the decoder
//! - The decoder's input side (feed) with starvation waits and resync
//! - The decoder's output side (fixed-point to 16-bit PCM, playback start)
//! - MPEG audio decoding using symphonia (optional, feature-gated)
//! - Session orchestration with cooperative cancellation
//!
//! ## Threads
//!
//! A session uses two threads: the `stream-producer` thread reading the
//! source, and the caller's thread running the decoder engine. They share
//! only the ring buffer (behind a `parking_lot::Mutex`), the producer
//! status and the [`CancelFlag`].

pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod feed;
pub mod output;
pub mod pcm;
pub mod producer;
pub mod ring_buffer;
pub mod streaming;

pub use config::{buffer_size_for_bitrate, StreamingConfig, StreamingState, StreamingStats};
pub use engine::{
    DecodeCallbacks, DecoderEngine, Fixed, Flow, FrameError, PcmFrame, StreamView, FIXED_ONE,
    FRAC_BITS,
};
pub use error::{PlaybackError, Result};
pub use feed::{FeedAdapter, FeedStats};
pub use output::{OutputPipeline, OutputStats, PlaybackStart};
pub use producer::{Producer, ProducerState, ProducerStatus};
pub use ring_buffer::{RingBuffer, SharedRingBuffer};
pub use streaming::{CancelFlag, SessionOutcome, SessionReport, StreamingService};

#[cfg(feature = "decoder-mp3")]
pub use decoder::MpegFrameEngine;
