//! # Output Pipeline
//!
//! Implements the decoder's output side: converts each decoded frame to
//! 16-bit PCM, forwards it to the [`AudioSink`], and starts playback once
//! enough audio has been queued.
//!
//! Any failure here ends the session. The caller turns an `Err` into
//! `Flow::Stop` for the engine and keeps the error as the session result.

use crate::engine::{Flow, PcmFrame};
use crate::error::{PlaybackError, Result};
use crate::pcm;
use crate::streaming::CancelFlag;
use bridge_traits::AudioSink;
use tracing::{debug, debug_span, info, warn};

/// Playback start tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStart {
    /// PCM bytes written so far, playback not started.
    Accumulating(usize),
    /// `start_playback` succeeded; nothing is tracked any more.
    Playing,
}

impl PlaybackStart {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackStart::Playing)
    }
}

/// Counters kept by the output pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputStats {
    pub frames_written: u64,
    pub pcm_bytes_written: u64,
    pub short_writes: u64,
}

/// Scratch PCM buffer that is emptied whenever the borrow ends.
struct ScratchPcm<'a>(&'a mut Vec<i16>);

impl<'a> ScratchPcm<'a> {
    fn new(buffer: &'a mut Vec<i16>) -> Self {
        buffer.clear();
        Self(buffer)
    }
}

impl std::ops::Deref for ScratchPcm<'_> {
    type Target = Vec<i16>;

    fn deref(&self) -> &Vec<i16> {
        self.0
    }
}

impl std::ops::DerefMut for ScratchPcm<'_> {
    fn deref_mut(&mut self) -> &mut Vec<i16> {
        self.0
    }
}

impl Drop for ScratchPcm<'_> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

/// Decoder output adapter in front of an [`AudioSink`].
pub struct OutputPipeline<S: AudioSink> {
    sink: S,
    cancel: CancelFlag,
    format: Option<(u32, u16)>,
    start: PlaybackStart,
    sink_capacity: usize,
    start_threshold: usize,
    scratch: Vec<i16>,
    stats: OutputStats,
}

impl<S: AudioSink> OutputPipeline<S> {
    /// Wrap `sink`, starting playback once `start_threshold_percent` of its
    /// buffer has been written.
    pub fn new(sink: S, cancel: CancelFlag, start_threshold_percent: u8) -> Result<Self> {
        let sink_capacity = sink.buffer_capacity_bytes()?;
        let start_threshold = sink_capacity * start_threshold_percent as usize / 100;
        debug!(sink_capacity, start_threshold, "Output pipeline ready");

        Ok(Self {
            sink,
            cancel,
            format: None,
            start: PlaybackStart::Accumulating(0),
            sink_capacity,
            start_threshold,
            scratch: Vec::new(),
            stats: OutputStats::default(),
        })
    }

    pub fn playback_start(&self) -> PlaybackStart {
        self.start
    }

    pub fn stats(&self) -> OutputStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Convert and forward one decoded frame.
    ///
    /// Returns `Ok(Flow::Stop)` when cancelled.
    pub fn write_frame(&mut self, frame: &PcmFrame<'_>) -> Result<Flow> {
        let _span = debug_span!(
            "output_frame",
            sample_rate = frame.sample_rate,
            channels = frame.channels
        )
        .entered();
        let mut scratch = ScratchPcm::new(&mut self.scratch);

        if self.cancel.is_cancelled() {
            return Ok(Flow::Stop);
        }

        if frame.channels == 0 || frame.channels > 2 {
            return Err(PlaybackError::UnsupportedChannels(frame.channels));
        }
        if frame.channels == 2 && frame.right.is_none() {
            return Err(PlaybackError::DecoderError(
                "stereo frame without a right channel".to_string(),
            ));
        }

        let format = (frame.sample_rate, frame.channels);
        if self.format != Some(format) {
            info!(
                sample_rate = frame.sample_rate,
                channels = frame.channels,
                "Output format changed"
            );
            let notified = self
                .sink
                .notify_format_changed(frame.sample_rate, frame.channels);
            // Recorded even on failure so the same format is not re-announced
            self.format = Some(format);
            notified?;
        }

        // Mono frames carry no right plane; only the left one is emitted
        let frame = if frame.channels == 1 {
            PcmFrame {
                right: None,
                ..*frame
            }
        } else {
            *frame
        };

        pcm::interleave_into(&frame, &mut scratch);
        let offered = pcm::byte_len(&scratch);

        if offered > self.sink_capacity {
            return Err(PlaybackError::FrameTooLarge {
                bytes: offered,
                capacity: self.sink_capacity,
            });
        }

        let accepted = self.sink.write_samples(&scratch)?;
        if accepted < offered {
            self.stats.short_writes += 1;
            warn!(offered, accepted, "Audio sink accepted a short write");
        }
        self.stats.frames_written += 1;
        self.stats.pcm_bytes_written += offered as u64;

        if let PlaybackStart::Accumulating(queued) = self.start {
            let queued = queued + offered;
            if queued >= self.start_threshold {
                self.sink.start_playback()?;
                info!(queued, "Playback started");
                self.start = PlaybackStart::Playing;
            } else {
                self.start = PlaybackStart::Accumulating(queued);
            }
        }

        Ok(Flow::Continue)
    }
}
