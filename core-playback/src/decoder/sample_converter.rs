//! # Sample Format Converter
//!
//! Converts symphonia audio buffers to the planar fixed-point layout the
//! output pipeline expects.

use crate::engine::{Fixed, PcmFrame};
use crate::pcm::fixed_from_f32;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::conv::IntoSample;
use symphonia::core::sample::Sample;

/// Reusable left/right fixed-point planes.
///
/// Symphonia outputs audio in various formats (i16, i24, i32, f32, f64).
/// Every format is normalized through `f32` and stored as [`Fixed`]. Only
/// the first two channels are kept; the channel count is still reported.
#[derive(Debug, Default)]
pub struct FixedPlanes {
    left: Vec<Fixed>,
    right: Vec<Fixed>,
    channels: u16,
}

impl FixedPlanes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Samples per channel currently held.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Replace the planes with the contents of `buffer`.
    pub fn load(&mut self, buffer: &AudioBufferRef<'_>) {
        match buffer {
            AudioBufferRef::F32(buf) => self.load_planes(&**buf),
            AudioBufferRef::F64(buf) => self.load_planes(&**buf),
            AudioBufferRef::S32(buf) => self.load_planes(&**buf),
            AudioBufferRef::S24(buf) => self.load_planes(&**buf),
            AudioBufferRef::S16(buf) => self.load_planes(&**buf),
            AudioBufferRef::S8(buf) => self.load_planes(&**buf),
            AudioBufferRef::U32(buf) => self.load_planes(&**buf),
            AudioBufferRef::U24(buf) => self.load_planes(&**buf),
            AudioBufferRef::U16(buf) => self.load_planes(&**buf),
            AudioBufferRef::U8(buf) => self.load_planes(&**buf),
        }
    }

    fn load_planes<T>(&mut self, buf: &AudioBuffer<T>)
    where
        T: Sample + IntoSample<f32>,
    {
        let channels = buf.spec().channels.count();
        self.channels = u16::try_from(channels).unwrap_or(u16::MAX);
        self.left.clear();
        self.right.clear();

        if channels > 0 {
            self.left
                .extend(buf.chan(0).iter().map(|&s| fixed_from_f32(s.into_sample())));
        }
        if channels > 1 {
            self.right
                .extend(buf.chan(1).iter().map(|&s| fixed_from_f32(s.into_sample())));
        }
    }

    /// View the planes as a frame at `sample_rate`.
    pub fn frame(&self, sample_rate: u32) -> PcmFrame<'_> {
        PcmFrame {
            sample_rate,
            channels: self.channels,
            left: &self.left,
            right: (self.channels > 1).then_some(&self.right[..]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FIXED_ONE;
    use symphonia::core::audio::{AsAudioBufferRef, Channels, SignalSpec};

    fn spec(channels: Channels) -> SignalSpec {
        SignalSpec::new(44100, channels)
    }

    #[test]
    fn test_load_stereo_f32() {
        let mut buf = AudioBuffer::<f32>::new(4, spec(Channels::FRONT_LEFT | Channels::FRONT_RIGHT));
        buf.render_reserved(Some(2));
        buf.chan_mut(0).copy_from_slice(&[0.5, -0.5]);
        buf.chan_mut(1).copy_from_slice(&[1.0, 0.0]);

        let mut planes = FixedPlanes::new();
        planes.load(&buf.as_audio_buffer_ref());

        let frame = planes.frame(44100);
        assert_eq!(frame.channels, 2);
        assert_eq!(frame.left, &[FIXED_ONE / 2, -FIXED_ONE / 2]);
        assert_eq!(frame.right, Some(&[FIXED_ONE, 0][..]));
    }

    #[test]
    fn test_load_mono_i16() {
        let mut buf = AudioBuffer::<i16>::new(4, spec(Channels::FRONT_LEFT));
        buf.render_reserved(Some(3));
        buf.chan_mut(0).copy_from_slice(&[0, i16::MIN, 16384]);

        let mut planes = FixedPlanes::new();
        planes.load(&buf.as_audio_buffer_ref());

        assert_eq!(planes.channels(), 1);
        assert_eq!(planes.len(), 3);
        let frame = planes.frame(8000);
        assert!(frame.right.is_none());
        assert_eq!(frame.left[1], -FIXED_ONE);
        assert_eq!(frame.left[2], FIXED_ONE / 2);
    }

    #[test]
    fn test_reload_replaces_previous_planes() {
        let mut stereo = AudioBuffer::<f32>::new(8, spec(Channels::FRONT_LEFT | Channels::FRONT_RIGHT));
        stereo.render_reserved(Some(8));
        let mut mono = AudioBuffer::<f32>::new(2, spec(Channels::FRONT_LEFT));
        mono.render_reserved(Some(2));

        let mut planes = FixedPlanes::new();
        planes.load(&stereo.as_audio_buffer_ref());
        assert_eq!(planes.len(), 8);

        planes.load(&mono.as_audio_buffer_ref());
        assert_eq!(planes.len(), 2);
        assert!(planes.frame(44100).right.is_none());
    }
}
