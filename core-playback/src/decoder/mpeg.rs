//! # MPEG Audio Frame Engine
//!
//! A [`DecoderEngine`] for raw MPEG audio streams (no container). It cuts
//! frames out of each offered [`StreamView`] using the frame headers and
//! decodes Layer III frames with symphonia's MP3 decoder.
//!
//! Per view:
//!
//! - bytes before the next valid header are skipped and reported as
//!   [`FrameError::LostSync`]
//! - a frame that is not complete yet stays unconsumed; the engine reports
//!   its start as `next_frame` and asks for more input
//! - Layer I/II frames are skipped as [`FrameError::Unsupported`]
//! - frames symphonia cannot decode are skipped as [`FrameError::Corrupt`]

use super::frame_header::{find_sync, FrameHeader, Layer, HEADER_LEN, MAX_FRAME_LEN};
use super::sample_converter::FixedPlanes;
use crate::engine::{DecodeCallbacks, DecoderEngine, Flow, FrameError, StreamView};
use crate::error::Result;
use symphonia::core::audio::Channels;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_MP3};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use tracing::{debug, trace};

/// What the engine found at the current position of a view.
enum Scan {
    /// A complete frame of this length starts here.
    Frame(FrameHeader, usize),
    /// A frame starts here but is not fully buffered yet.
    Partial,
    /// Skip this many bytes, they do not start a usable frame.
    Skip(usize),
    /// Nothing more can be done with this view.
    Exhausted,
}

/// Decoder engine for MPEG audio Layer III streams.
pub struct MpegFrameEngine {
    decoder: Option<Box<dyn Decoder>>,
    format: Option<(u32, u16)>,
    planes: FixedPlanes,
    frames_decoded: u64,
}

impl Default for MpegFrameEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MpegFrameEngine {
    pub fn new() -> Self {
        Self {
            decoder: None,
            format: None,
            planes: FixedPlanes::new(),
            frames_decoded: 0,
        }
    }

    /// Frames successfully decoded so far.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    fn scan(data: &[u8]) -> Scan {
        match find_sync(data) {
            Some(0) => {}
            Some(offset) => return Scan::Skip(offset),
            // The last bytes may be the start of a split header
            None => {
                let keep = data.len().min(HEADER_LEN - 1);
                return match data.len() - keep {
                    0 => Scan::Exhausted,
                    skipped => Scan::Skip(skipped),
                };
            }
        }

        let Some(header) = FrameHeader::parse(data) else {
            return Scan::Skip(1);
        };
        let len = header.frame_len();
        if len <= HEADER_LEN {
            return Scan::Skip(1);
        }

        if data.len() >= len {
            Scan::Frame(header, len)
        } else if data.len() >= MAX_FRAME_LEN {
            // Enough bytes for any real frame: this was a false sync
            Scan::Skip(1)
        } else {
            Scan::Partial
        }
    }

    /// Decode one complete frame into `self.planes`.
    fn decode_frame(&mut self, header: &FrameHeader, frame: &[u8]) -> std::result::Result<(), FrameError> {
        if header.layer != Layer::III {
            return Err(FrameError::Unsupported(format!(
                "MPEG audio layer {:?}",
                header.layer
            )));
        }

        let format = (header.sample_rate, header.channels());
        if self.format != Some(format) || self.decoder.is_none() {
            self.decoder = Some(Self::make_decoder(format.0, format.1)?);
            self.format = Some(format);
            debug!(
                sample_rate = format.0,
                channels = format.1,
                "MP3 decoder configured"
            );
        }

        let Some(decoder) = self.decoder.as_mut() else {
            return Err(FrameError::Corrupt("decoder unavailable".to_string()));
        };

        let packet = Packet::new_from_slice(0, self.frames_decoded, header.samples_per_frame() as u64, frame);
        match decoder.decode(&packet) {
            Ok(decoded) => {
                self.planes.load(&decoded);
                self.frames_decoded += 1;
                Ok(())
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                Err(FrameError::Corrupt("decoder reset required".to_string()))
            }
            Err(SymphoniaError::Unsupported(what)) => Err(FrameError::Unsupported(what.to_string())),
            Err(e) => Err(FrameError::Corrupt(e.to_string())),
        }
    }

    fn make_decoder(sample_rate: u32, channels: u16) -> std::result::Result<Box<dyn Decoder>, FrameError> {
        let layout = if channels == 1 {
            Channels::FRONT_LEFT
        } else {
            Channels::FRONT_LEFT | Channels::FRONT_RIGHT
        };

        let mut params = CodecParameters::new();
        params
            .for_codec(CODEC_TYPE_MP3)
            .with_sample_rate(sample_rate)
            .with_channels(layout);

        symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| FrameError::Unsupported(format!("failed to create MP3 decoder: {}", e)))
    }
}

impl DecoderEngine for MpegFrameEngine {
    fn run(&mut self, callbacks: &mut dyn DecodeCallbacks) -> Result<()> {
        let mut view = StreamView::default();

        loop {
            if callbacks.input(&mut view) == Flow::Stop {
                debug!(frames = self.frames_decoded, "MPEG engine stopping");
                return Ok(());
            }

            // Cheap clone; keeps `view` free for the error callback
            let data = view.data.clone();
            let mut pos = 0;

            loop {
                match Self::scan(&data[pos..]) {
                    Scan::Exhausted | Scan::Partial => break,
                    Scan::Skip(skipped) => {
                        view.mark_consumed(pos);
                        pos += skipped;
                        trace!(skipped, "Skipping bytes outside any frame");
                        if callbacks.error(&FrameError::LostSync { skipped }, &view) == Flow::Stop {
                            return Ok(());
                        }
                    }
                    Scan::Frame(header, len) => {
                        let decoded = self.decode_frame(&header, &data[pos..pos + len]);
                        view.mark_consumed(pos);
                        pos += len;

                        let flow = match decoded {
                            Ok(()) => callbacks.output(&self.planes.frame(header.sample_rate)),
                            Err(err) => callbacks.error(&err, &view),
                        };
                        if flow == Flow::Stop {
                            return Ok(());
                        }
                    }
                }
            }

            view.mark_consumed(pos);
        }
    }

    fn min_input_bytes(&self) -> usize {
        MAX_FRAME_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PcmFrame;
    use bytes::Bytes;

    const MPEG1_L3_128K: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];
    const MPEG1_L2_192K: [u8; 4] = [0xFF, 0xFD, 0xA4, 0x00];

    /// A silent Layer III frame: header followed by zeroed side info and data.
    fn silent_frame() -> Vec<u8> {
        let mut frame = MPEG1_L3_128K.to_vec();
        frame.resize(417, 0);
        frame
    }

    /// Offers scripted views and records what the engine reports.
    #[derive(Default)]
    struct Recorder {
        views: Vec<Vec<u8>>,
        offered: usize,
        next_frames: Vec<Option<usize>>,
        frames: Vec<(u32, u16, usize)>,
        errors: Vec<FrameError>,
    }

    impl DecodeCallbacks for Recorder {
        fn input(&mut self, view: &mut StreamView) -> Flow {
            self.next_frames.push(view.next_frame);
            let Some(data) = self.views.get(self.offered) else {
                return Flow::Stop;
            };
            view.start = 0;
            view.data = Bytes::from(data.clone());
            view.next_frame = None;
            self.offered += 1;
            Flow::Continue
        }

        fn output(&mut self, frame: &PcmFrame<'_>) -> Flow {
            self.frames.push((frame.sample_rate, frame.channels, frame.len()));
            Flow::Continue
        }

        fn error(&mut self, error: &FrameError, _view: &StreamView) -> Flow {
            self.errors.push(error.clone());
            Flow::Continue
        }
    }

    #[test]
    fn test_garbage_is_reported_as_lost_sync() {
        let mut recorder = Recorder {
            views: vec![vec![0x12; 10]],
            ..Default::default()
        };

        MpegFrameEngine::new().run(&mut recorder).unwrap();

        assert_eq!(recorder.errors, vec![FrameError::LostSync { skipped: 7 }]);
        // Three bytes are kept for a possibly split header
        assert_eq!(recorder.next_frames, vec![None, Some(7)]);
        assert!(recorder.frames.is_empty());
    }

    #[test]
    fn test_partial_frame_is_left_unconsumed() {
        let mut data = vec![0x00, 0x00];
        data.extend_from_slice(&silent_frame()[..100]);
        let mut recorder = Recorder {
            views: vec![data],
            ..Default::default()
        };

        MpegFrameEngine::new().run(&mut recorder).unwrap();

        assert_eq!(recorder.errors, vec![FrameError::LostSync { skipped: 2 }]);
        assert_eq!(recorder.next_frames, vec![None, Some(2)]);
    }

    #[test]
    fn test_min_input_covers_longest_frame() {
        let engine: Box<dyn DecoderEngine> = Box::new(MpegFrameEngine::new());
        assert_eq!(engine.min_input_bytes(), MAX_FRAME_LEN);
    }

    #[test]
    fn test_layer2_frames_are_unsupported() {
        let mut frame = MPEG1_L2_192K.to_vec();
        frame.resize(576, 0);
        let mut recorder = Recorder {
            views: vec![frame],
            ..Default::default()
        };

        MpegFrameEngine::new().run(&mut recorder).unwrap();

        assert_eq!(recorder.errors.len(), 1);
        assert!(matches!(recorder.errors[0], FrameError::Unsupported(_)));
        assert_eq!(recorder.next_frames, vec![None, Some(576)]);
    }

    #[test]
    fn test_decodes_silent_layer3_frames() {
        let mut data = silent_frame();
        data.extend_from_slice(&silent_frame());
        let mut recorder = Recorder {
            views: vec![data],
            ..Default::default()
        };
        let mut engine = MpegFrameEngine::new();

        engine.run(&mut recorder).unwrap();

        assert!(recorder.errors.is_empty(), "{:?}", recorder.errors);
        assert_eq!(recorder.frames, vec![(44100, 2, 1152); 2]);
        assert_eq!(engine.frames_decoded(), 2);
        assert_eq!(recorder.next_frames, vec![None, Some(834)]);
    }

    #[test]
    fn test_stop_from_output_ends_run() {
        struct StopOnFirstFrame(bool);

        impl DecodeCallbacks for StopOnFirstFrame {
            fn input(&mut self, view: &mut StreamView) -> Flow {
                let mut data = silent_frame();
                data.extend_from_slice(&silent_frame());
                view.data = Bytes::from(data);
                Flow::Continue
            }

            fn output(&mut self, _frame: &PcmFrame<'_>) -> Flow {
                assert!(!self.0, "output called after Stop");
                self.0 = true;
                Flow::Stop
            }

            fn error(&mut self, _error: &FrameError, _view: &StreamView) -> Flow {
                Flow::Continue
            }
        }

        let mut callbacks = StopOnFirstFrame(false);
        MpegFrameEngine::new().run(&mut callbacks).unwrap();
        assert!(callbacks.0);
    }
}
