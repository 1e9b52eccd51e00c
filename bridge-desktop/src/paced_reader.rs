//! Rate-limited byte source
//!
//! Makes a local file behave like a live network stream: bytes become
//! readable at a fixed rate instead of all at once.

use std::io::{self, ErrorKind, Read};
use std::time::{Duration, Instant};

/// Longest single sleep inside `read`.
const MAX_SLEEP: Duration = Duration::from_millis(10);

/// [`Read`] adapter delivering at most `bytes_per_sec` on average.
///
/// When no bytes are due yet, `read` sleeps up to 10 ms and then fails with
/// `WouldBlock`, so callers that retry (like the stream producer) keep
/// checking for cancellation.
pub struct PacedReader<R> {
    inner: R,
    bytes_per_sec: u64,
    started: Option<Instant>,
    delivered: u64,
}

impl<R: Read> PacedReader<R> {
    pub fn new(inner: R, bytes_per_sec: u64) -> Self {
        Self {
            inner,
            bytes_per_sec: bytes_per_sec.max(1),
            started: None,
            delivered: 0,
        }
    }

    /// Pace at a stream bitrate in kilobits per second.
    pub fn for_bitrate(inner: R, kbps: u32) -> Self {
        Self::new(inner, u64::from(kbps) * 1000 / 8)
    }

    pub fn bytes_delivered(&self) -> u64 {
        self.delivered
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn due(&self, now: Instant, started: Instant) -> u64 {
        let elapsed = now.duration_since(started).as_micros() as u64;
        let allowed = elapsed.saturating_mul(self.bytes_per_sec) / 1_000_000;
        allowed.saturating_sub(self.delivered)
    }
}

impl<R: Read> Read for PacedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        // The first read always gets one byte's worth of time for free
        let started = *self.started.get_or_insert_with(Instant::now);
        let mut due = self.due(Instant::now(), started).max(u64::from(self.delivered == 0));

        if due == 0 {
            let per_byte = Duration::from_micros(1_000_000 / self.bytes_per_sec + 1);
            std::thread::sleep(per_byte.min(MAX_SLEEP));
            due = self.due(Instant::now(), started);
            if due == 0 {
                return Err(io::Error::from(ErrorKind::WouldBlock));
            }
        }

        let limit = buf.len().min(usize::try_from(due).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..limit])?;
        self.delivered += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all<R: Read>(reader: &mut R) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => return out,
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    }

    #[test]
    fn test_delivers_all_bytes_in_order() {
        let data: Vec<u8> = (0..=255).cycle().take(2000).collect();
        let mut reader = PacedReader::new(Cursor::new(data.clone()), 200_000);

        assert_eq!(read_all(&mut reader), data);
        assert_eq!(reader.bytes_delivered(), 2000);
    }

    #[test]
    fn test_rate_is_limited() {
        // 4 KB at 40 KB/s takes about 100 ms
        let mut reader = PacedReader::new(Cursor::new(vec![0u8; 4000]), 40_000);
        let started = Instant::now();
        read_all(&mut reader);
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn test_for_bitrate() {
        let reader = PacedReader::for_bitrate(Cursor::new(Vec::new()), 128);
        assert_eq!(reader.bytes_per_sec, 16_000);
    }
}
