//! # Audio Decoder Module
//!
//! MPEG audio decoding behind the [`DecoderEngine`](crate::engine::DecoderEngine)
//! contract, using the Symphonia library.
//!
//! ## Overview
//!
//! The streamer receives a raw MPEG audio byte stream (no container, no
//! seeking), so Symphonia's format readers are not used. Instead the engine
//! finds frames itself and hands each one to Symphonia's MP3 codec as a
//! packet:
//!
//! ```text
//! StreamView → frame_header::find_sync → FrameHeader::frame_len
//!            → symphonia Decoder::decode → FixedPlanes → PcmFrame
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Feature Flag | Notes |
//! |--------|--------------|-------|
//! | MPEG-1/2/2.5 Layer III | `decoder-mp3` | CBR and VBR, not free-format |
//!
//! Layer I and II frames are recognized and skipped.

pub mod frame_header;

#[cfg(feature = "decoder-mp3")]
mod mpeg;

#[cfg(feature = "decoder-mp3")]
mod sample_converter;

pub use frame_header::{find_sync, ChannelMode, FrameHeader, Layer, MpegVersion};

#[cfg(feature = "decoder-mp3")]
pub use mpeg::MpegFrameEngine;

#[cfg(feature = "decoder-mp3")]
pub use sample_converter::FixedPlanes;
