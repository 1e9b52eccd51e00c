//! # Decoder Engine Contract
//!
//! The decoder is driven through three callbacks owned by the streaming
//! session, and it owns the loop that calls them:
//!
//! - `input` refills a [`StreamView`] with compressed bytes from the ring
//! - `output` receives each decoded [`PcmFrame`]
//! - `error` is told about recoverable per-frame problems
//!
//! Every callback answers with a [`Flow`]. `Flow::Stop` ends the whole
//! session; an engine must return from [`DecoderEngine::run`] as soon as it
//! sees it.
//!
//! ```text
//!   ┌────────────── DecoderEngine::run ──────────────┐
//!   │                                                │
//!   │  input(&mut view) ──► parse / decode frames    │
//!   │        ▲                   │         │         │
//!   │        │             output(frame) error(e)    │
//!   │        └───── next_frame ──┘                   │
//!   └────────────────────────────────────────────────┘
//! ```

use crate::error::Result;
use bytes::Bytes;

/// Decoded sample in fixed point with [`FRAC_BITS`] fractional bits.
pub type Fixed = i32;

/// Fractional bits of a [`Fixed`] sample.
pub const FRAC_BITS: u32 = 28;

/// `1.0` in [`Fixed`] representation.
pub const FIXED_ONE: Fixed = 1 << FRAC_BITS;

/// Whether the decode loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

impl Flow {
    pub fn is_stop(self) -> bool {
        self == Flow::Stop
    }
}

/// Compressed bytes handed to the decoder by one `input` call.
///
/// `data` is a copy of the ring region starting at ring index `start`, so
/// the engine may keep it while the producer keeps writing. Before the next
/// `input` call the engine records in `next_frame` the ring index of the
/// first byte it has not consumed (`start + consumed`).
#[derive(Debug, Clone, Default)]
pub struct StreamView {
    pub start: usize,
    pub data: Bytes,
    pub next_frame: Option<usize>,
}

impl StreamView {
    /// Report that the first `consumed` bytes of `data` were used up.
    pub fn mark_consumed(&mut self, consumed: usize) {
        self.next_frame = Some(self.start + consumed.min(self.data.len()));
    }

    /// Bytes consumed so far according to `next_frame`.
    pub fn consumed(&self) -> usize {
        self.next_frame
            .map(|next| next.saturating_sub(self.start))
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One decoded frame in planar fixed-point form.
#[derive(Debug, Clone, Copy)]
pub struct PcmFrame<'a> {
    pub sample_rate: u32,
    /// Channel count reported by the bitstream. Only the first two planes
    /// are carried.
    pub channels: u16,
    pub left: &'a [Fixed],
    pub right: Option<&'a [Fixed]>,
}

impl<'a> PcmFrame<'a> {
    pub fn mono(sample_rate: u32, samples: &'a [Fixed]) -> Self {
        Self {
            sample_rate,
            channels: 1,
            left: samples,
            right: None,
        }
    }

    pub fn stereo(sample_rate: u32, left: &'a [Fixed], right: &'a [Fixed]) -> Self {
        Self {
            sample_rate,
            channels: 2,
            left,
            right: Some(right),
        }
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        match self.right {
            Some(right) => self.left.len().min(right.len()),
            None => self.left.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Recoverable per-frame decode problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Bytes that did not belong to any frame were skipped.
    LostSync { skipped: usize },
    /// A frame header was valid but its payload could not be decoded.
    Corrupt(String),
    /// The frame uses a feature this engine does not decode.
    Unsupported(String),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::LostSync { skipped } => write!(f, "lost sync, skipped {} bytes", skipped),
            FrameError::Corrupt(msg) => write!(f, "corrupt frame: {}", msg),
            FrameError::Unsupported(msg) => write!(f, "unsupported frame: {}", msg),
        }
    }
}

/// Callbacks a [`DecoderEngine`] drives.
pub trait DecodeCallbacks {
    /// Refill `view` with the next compressed bytes.
    ///
    /// `view.next_frame` carries the engine's progress through the previous
    /// view. On `Flow::Continue` the view has been replaced and its
    /// `next_frame` cleared.
    fn input(&mut self, view: &mut StreamView) -> Flow;

    /// Accept one decoded frame.
    fn output(&mut self, frame: &PcmFrame<'_>) -> Flow;

    /// A frame could not be decoded; the engine resumes at the next frame.
    fn error(&mut self, error: &FrameError, view: &StreamView) -> Flow;
}

/// A decoder that owns the decode loop.
///
/// `run` returns `Ok(())` once any callback answered `Flow::Stop`. An `Err`
/// means the engine itself broke down, not the stream.
pub trait DecoderEngine: Send {
    fn run(&mut self, callbacks: &mut dyn DecodeCallbacks) -> Result<()>;

    /// Smallest view that always lets the engine consume something: the
    /// longest frame it may have to see whole.
    fn min_input_bytes(&self) -> usize {
        1
    }
}

impl<E: DecoderEngine + ?Sized> DecoderEngine for Box<E> {
    fn run(&mut self, callbacks: &mut dyn DecodeCallbacks) -> Result<()> {
        (**self).run(callbacks)
    }

    fn min_input_bytes(&self) -> usize {
        (**self).min_input_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_view_consumed() {
        let mut view = StreamView {
            start: 100,
            data: Bytes::from_static(&[0; 40]),
            next_frame: None,
        };
        assert_eq!(view.consumed(), 0);

        view.mark_consumed(25);
        assert_eq!(view.next_frame, Some(125));
        assert_eq!(view.consumed(), 25);

        view.mark_consumed(1000);
        assert_eq!(view.next_frame, Some(140));
    }

    #[test]
    fn test_pcm_frame_len() {
        let left = [1, 2, 3];
        let right = [4, 5];
        assert_eq!(PcmFrame::mono(44100, &left).len(), 3);
        assert_eq!(PcmFrame::stereo(44100, &left, &right).len(), 2);
        assert_eq!(PcmFrame::stereo(44100, &left, &right).channels, 2);
    }

    #[test]
    fn test_frame_error_display() {
        assert_eq!(
            FrameError::LostSync { skipped: 12 }.to_string(),
            "lost sync, skipped 12 bytes"
        );
        assert!(Flow::Stop.is_stop());
        assert!(!Flow::Continue.is_stop());
    }
}
