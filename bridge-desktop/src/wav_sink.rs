//! WAV file audio sink using `hound`
//!
//! Stands in for a sound device on desktop: PCM handed to the sink is
//! written to a 16-bit WAV file instead of being played.

use bridge_traits::{
    error::{BridgeError, Result},
    playback::AudioSink,
};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default playback buffer the sink reports: one second of 44.1 kHz stereo.
pub const DEFAULT_BUFFER_CAPACITY: usize = 44_100 * 2 * 2;

/// `AudioSink` writing 16-bit PCM to WAV files.
///
/// A WAV file has a single format, so a format change after audio was
/// written finalizes the current file and continues in a new segment next
/// to it (`song.wav`, `song-1.wav`, ...).
pub struct WavFileSink {
    path: PathBuf,
    buffer_capacity: usize,
    writer: Option<WavWriter<BufWriter<File>>>,
    spec: Option<WavSpec>,
    segments: Vec<PathBuf>,
    samples_written: u64,
    playback_started: bool,
}

impl WavFileSink {
    /// Create a sink writing to `path`.
    ///
    /// Nothing is created on disk until the first format notification.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            writer: None,
            spec: None,
            segments: Vec::new(),
            samples_written: 0,
            playback_started: false,
        }
    }

    /// Report `bytes` as the playback buffer size.
    pub fn with_buffer_capacity(mut self, bytes: usize) -> Self {
        self.buffer_capacity = bytes;
        self
    }

    /// Files written so far, in order.
    pub fn segments(&self) -> &[PathBuf] {
        &self.segments
    }

    /// Total samples written across all channels and segments.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    pub fn playback_started(&self) -> bool {
        self.playback_started
    }

    /// Finalize the current file, updating its header.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(map_hound_error)?;
            debug!(path = ?self.segments.last(), "WAV segment finalized");
        }
        Ok(())
    }

    fn segment_path(&self, index: usize) -> PathBuf {
        if index == 0 {
            return self.path.clone();
        }
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let parent = self.path.parent().unwrap_or_else(|| Path::new(""));
        parent.join(format!("{}-{}.wav", stem, index))
    }
}

fn map_hound_error(e: hound::Error) -> BridgeError {
    match e {
        hound::Error::IoError(io) => BridgeError::Io(io),
        other => BridgeError::OperationFailed(format!("WAV write failed: {}", other)),
    }
}

impl AudioSink for WavFileSink {
    fn notify_format_changed(&mut self, sample_rate: u32, channels: u16) -> Result<()> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        if self.spec == Some(spec) {
            return Ok(());
        }

        self.finish()?;
        let path = self.segment_path(self.segments.len());
        let writer = WavWriter::create(&path, spec).map_err(map_hound_error)?;
        info!(?path, sample_rate, channels, "Writing WAV output");

        self.writer = Some(writer);
        self.spec = Some(spec);
        self.segments.push(path);
        Ok(())
    }

    fn write_samples(&mut self, samples: &[i16]) -> Result<usize> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            BridgeError::NotAvailable("WAV output format not set".to_string())
        })?;

        for &sample in samples {
            writer.write_sample(sample).map_err(map_hound_error)?;
        }
        self.samples_written += samples.len() as u64;

        Ok(std::mem::size_of_val(samples))
    }

    fn start_playback(&mut self) -> Result<()> {
        if !self.playback_started {
            info!(samples = self.samples_written, "Playback started (WAV sink)");
            self.playback_started = true;
        }
        Ok(())
    }

    fn buffer_capacity_bytes(&self) -> Result<usize> {
        Ok(self.buffer_capacity)
    }
}

impl Drop for WavFileSink {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!(error = %e, "Failed to finalize WAV output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    #[test]
    fn test_writes_wav_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let mut sink = WavFileSink::new(&path).with_buffer_capacity(4096);
        assert_eq!(sink.buffer_capacity_bytes().unwrap(), 4096);

        sink.notify_format_changed(22050, 2).unwrap();
        assert_eq!(sink.write_samples(&[1, -1, 1000, -1000]).unwrap(), 8);
        sink.start_playback().unwrap();
        assert!(sink.playback_started());
        sink.finish().unwrap();

        let mut reader = WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 22050);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.bits_per_sample, 16);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, -1, 1000, -1000]);
    }

    #[test]
    fn test_write_before_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = WavFileSink::new(dir.path().join("out.wav"));

        let result = sink.write_samples(&[0; 4]);
        assert!(matches!(result, Err(BridgeError::NotAvailable(_))));
    }

    #[test]
    fn test_format_change_starts_new_segment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.wav");
        let mut sink = WavFileSink::new(&path);

        sink.notify_format_changed(44100, 2).unwrap();
        sink.write_samples(&[5; 8]).unwrap();
        // Same format again is not a new segment
        sink.notify_format_changed(44100, 2).unwrap();
        sink.notify_format_changed(22050, 1).unwrap();
        sink.write_samples(&[7; 3]).unwrap();
        drop(sink);

        let first = WavReader::open(&path).unwrap();
        assert_eq!(first.spec().sample_rate, 44100);
        assert_eq!(first.len(), 8);

        let second = WavReader::open(dir.path().join("song-1.wav")).unwrap();
        assert_eq!(second.spec().channels, 1);
        assert_eq!(second.len(), 3);
    }
}
