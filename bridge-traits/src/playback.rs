//! Playback bridge traits.
//!
//! These abstractions let the decode pipeline hand finished PCM to a
//! platform-specific audio engine without knowing anything about it. Host
//! applications provide concrete implementations that satisfy their platform
//! constraints (desktop audio device, mobile audio track, file writer).

use crate::error::Result;

/// Destination for decoded 16-bit PCM.
///
/// The sink owns a playback buffer of fixed size. The core fills that buffer
/// through [`write_samples`](AudioSink::write_samples) and asks the sink to
/// start playing once enough audio has accumulated.
///
/// Samples are interleaved (`L, R, L, R, ...`) for stereo and plain for mono.
pub trait AudioSink: Send {
    /// The decoded stream switched to a new sample rate or channel count.
    ///
    /// Called before the first samples in the new format are written.
    /// Implementations typically tear down and recreate their output track.
    fn notify_format_changed(&mut self, sample_rate: u32, channels: u16) -> Result<()>;

    /// Queue interleaved samples for playback.
    ///
    /// Returns the number of **bytes** accepted. Accepting fewer bytes than
    /// offered is allowed; returning an error ends the streaming session.
    fn write_samples(&mut self, samples: &[i16]) -> Result<usize>;

    /// Begin audible playback of the queued samples.
    fn start_playback(&mut self) -> Result<()>;

    /// Size of the sink's playback buffer in bytes.
    fn buffer_capacity_bytes(&self) -> Result<usize>;
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn notify_format_changed(&mut self, sample_rate: u32, channels: u16) -> Result<()> {
        (**self).notify_format_changed(sample_rate, channels)
    }

    fn write_samples(&mut self, samples: &[i16]) -> Result<usize> {
        (**self).write_samples(samples)
    }

    fn start_playback(&mut self) -> Result<()> {
        (**self).start_playback()
    }

    fn buffer_capacity_bytes(&self) -> Result<usize> {
        (**self).buffer_capacity_bytes()
    }
}

impl<S: AudioSink + ?Sized> AudioSink for &mut S {
    fn notify_format_changed(&mut self, sample_rate: u32, channels: u16) -> Result<()> {
        (**self).notify_format_changed(sample_rate, channels)
    }

    fn write_samples(&mut self, samples: &[i16]) -> Result<usize> {
        (**self).write_samples(samples)
    }

    fn start_playback(&mut self) -> Result<()> {
        (**self).start_playback()
    }

    fn buffer_capacity_bytes(&self) -> Result<usize> {
        (**self).buffer_capacity_bytes()
    }
}

/// Listener for stream-level events the UI cares about.
///
/// Both callbacks run on streaming threads; implementations should hand the
/// notification off to their own UI thread rather than doing work inline.
pub trait StreamObserver: Send + Sync {
    /// `true` when the decoder starts waiting for network data, `false` once
    /// data arrives again.
    fn on_buffering(&self, _is_buffering: bool) {}

    /// The session ended on a fatal error. Not called for user cancellation.
    fn on_stream_error(&self, _message: &str) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StreamObserver for NoopObserver {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use mockall::mock;

    mock! {
        Sink {}

        impl AudioSink for Sink {
            fn notify_format_changed(&mut self, sample_rate: u32, channels: u16) -> Result<()>;
            fn write_samples(&mut self, samples: &[i16]) -> Result<usize>;
            fn start_playback(&mut self) -> Result<()>;
            fn buffer_capacity_bytes(&self) -> Result<usize>;
        }
    }

    #[test]
    fn boxed_sink_forwards_calls() {
        let mut mock = MockSink::new();
        mock.expect_buffer_capacity_bytes().returning(|| Ok(4096));
        mock.expect_write_samples()
            .withf(|samples| samples.len() == 3)
            .returning(|samples| Ok(samples.len() * 2));
        mock.expect_start_playback()
            .times(1)
            .returning(|| Err(BridgeError::OperationFailed("no device".into())));

        let mut boxed: Box<dyn AudioSink> = Box::new(mock);
        assert_eq!(boxed.buffer_capacity_bytes().unwrap(), 4096);
        assert_eq!(boxed.write_samples(&[1, 2, 3]).unwrap(), 6);
        assert!(boxed.start_playback().is_err());
    }

    #[test]
    fn borrowed_sink_forwards_calls() {
        let mut mock = MockSink::new();
        mock.expect_notify_format_changed()
            .withf(|rate, channels| *rate == 44100 && *channels == 2)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut borrowed = &mut mock;
        assert!(borrowed.notify_format_changed(44100, 2).is_ok());
    }

    #[test]
    fn noop_observer_accepts_events() {
        let observer = NoopObserver;
        observer.on_buffering(true);
        observer.on_buffering(false);
        observer.on_stream_error("boom");
    }
}
