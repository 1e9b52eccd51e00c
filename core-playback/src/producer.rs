//! # Stream Producer
//!
//! Pulls compressed bytes from a blocking [`Read`] source and stores them in
//! the shared ring buffer. Runs on its own thread; the decoder side only
//! observes it through [`ProducerStatus`].
//!
//! Reads happen without the ring lock held, so a slow network read never
//! blocks the decoder. When the ring is full the producer releases the lock,
//! sleeps one poll interval and tries again.

use crate::ring_buffer::SharedRingBuffer;
use crate::streaming::CancelFlag;
use parking_lot::{Mutex, MutexGuard};
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Lifecycle of the producer as seen by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Running,
    /// The source reported end of stream; everything read is in the ring.
    Finished,
    /// The source failed; see [`ProducerStatus::failure`].
    Failed,
}

const RUNNING: u8 = 0;
const FINISHED: u8 = 1;
const FAILED: u8 = 2;

/// Producer state shared with the consumer side.
#[derive(Debug, Default)]
pub struct ProducerStatus {
    state: AtomicU8,
    bytes_received: AtomicU64,
    failure: Mutex<Option<String>>,
    shutdown: AtomicBool,
}

impl ProducerStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ProducerState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => ProducerState::Running,
            FINISHED => ProducerState::Finished,
            FAILED => ProducerState::Failed,
            other => unreachable!("invalid producer state {}", other),
        }
    }

    /// Failure message, if the producer failed.
    pub fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }

    /// Total bytes stored in the ring so far.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Acquire)
    }

    /// Ask the producer to stop at its next check.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn mark_finished(&self) {
        self.state.store(FINISHED, Ordering::Release);
    }

    pub fn mark_failed(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
        self.state.store(FAILED, Ordering::Release);
    }

    fn add_bytes(&self, n: usize) {
        self.bytes_received.fetch_add(n as u64, Ordering::AcqRel);
    }
}

/// Fills the ring buffer from a byte source.
pub struct Producer {
    ring: SharedRingBuffer,
    status: Arc<ProducerStatus>,
    cancel: CancelFlag,
    chunk_bytes: usize,
    poll_interval: Duration,
}

impl Producer {
    pub fn new(
        ring: SharedRingBuffer,
        status: Arc<ProducerStatus>,
        cancel: CancelFlag,
        chunk_bytes: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            ring,
            status,
            cancel,
            chunk_bytes: chunk_bytes.max(1),
            poll_interval,
        }
    }

    fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.status.is_shutdown_requested()
    }

    /// Read `source` until end of stream, failure, cancellation or shutdown.
    ///
    /// `Interrupted`, `WouldBlock` and `TimedOut` reads are retried. A read
    /// that blocks forever keeps this thread alive, but not the session:
    /// see [`join_within`].
    pub fn run<R: Read>(self, mut source: R) {
        let mut chunk = vec![0u8; self.chunk_bytes];
        info!(chunk_bytes = self.chunk_bytes, "Producer started");

        loop {
            if self.should_stop() {
                debug!(
                    bytes = self.status.bytes_received(),
                    "Producer stopping on request"
                );
                return;
            }

            let n = match source.read(&mut chunk) {
                Ok(0) => {
                    self.status.mark_finished();
                    info!(bytes = self.status.bytes_received(), "Stream source finished");
                    return;
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    trace!("Source read timed out, retrying");
                    thread::sleep(self.poll_interval);
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "Stream source failed");
                    self.status.mark_failed(e.to_string());
                    return;
                }
            };

            if !self.store(&chunk[..n]) {
                debug!("Producer stopped while waiting for ring space");
                return;
            }
        }
    }

    /// Copy `data` into the ring, waiting for space as needed.
    ///
    /// Returns `false` if asked to stop before everything was stored.
    fn store(&self, mut data: &[u8]) -> bool {
        let mut ring = self.ring.lock();
        let mut announced = false;

        loop {
            let written = ring.write_from(data);
            if written > 0 {
                self.status.add_bytes(written);
                data = &data[written..];
            }

            if data.is_empty() {
                return true;
            }

            if self.should_stop() {
                return false;
            }

            if !announced {
                trace!(pending = data.len(), "Ring buffer full, producer waiting");
                announced = true;
            }

            MutexGuard::unlocked(&mut ring, || thread::sleep(self.poll_interval));
        }
    }
}

/// Spawn a producer thread named `stream-producer`.
pub fn spawn<R>(producer: Producer, source: R) -> std::io::Result<thread::JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("stream-producer".to_string())
        .spawn(move || producer.run(source))
        .inspect_err(|e| warn!(error = %e, "Failed to spawn producer thread"))
}

/// Wait up to `timeout` for the producer thread to exit.
///
/// Returns `Ok(true)` once joined and `Ok(false)` if the thread is still
/// inside a blocking source read when the time is up. The thread is then
/// detached: it exits on its own after the read returns, because shutdown
/// was already requested.
pub fn join_within(
    handle: thread::JoinHandle<()>,
    timeout: Duration,
    poll_interval: Duration,
) -> thread::Result<bool> {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(?timeout, "Producer blocked in source read, detaching thread");
            return Ok(false);
        }
        thread::sleep(poll_interval);
    }
    handle.join().map(|()| true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring_buffer::RingBuffer;
    use std::io::{self, Cursor};
    use std::sync::mpsc;

    fn producer_for(capacity: usize, chunk: usize) -> (Producer, SharedRingBuffer, Arc<ProducerStatus>, CancelFlag) {
        let ring = RingBuffer::shared(capacity).unwrap();
        let status = Arc::new(ProducerStatus::new());
        let cancel = CancelFlag::new();
        let producer = Producer::new(
            ring.clone(),
            status.clone(),
            cancel.clone(),
            chunk,
            Duration::from_micros(50),
        );
        (producer, ring, status, cancel)
    }

    /// Yields scripted results one read at a time.
    struct ScriptedSource {
        steps: Vec<io::Result<Vec<u8>>>,
    }

    impl Read for ScriptedSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.steps.is_empty() {
                return Ok(0);
            }
            match self.steps.remove(0) {
                Ok(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Err(e) => Err(e),
            }
        }
    }

    #[test]
    fn test_producer_reads_to_end() {
        let (producer, ring, status, _) = producer_for(64, 7);
        let data: Vec<u8> = (0..40).collect();

        producer.run(Cursor::new(data.clone()));

        assert_eq!(status.state(), ProducerState::Finished);
        assert_eq!(status.bytes_received(), 40);
        let mut out = vec![0; 40];
        assert_eq!(ring.lock().read_into(&mut out), 40);
        assert_eq!(out, data);
    }

    #[test]
    fn test_producer_retries_transient_errors() {
        let (producer, ring, status, _) = producer_for(64, 16);
        let source = ScriptedSource {
            steps: vec![
                Ok(vec![1, 2, 3]),
                Err(io::Error::from(ErrorKind::Interrupted)),
                Err(io::Error::from(ErrorKind::WouldBlock)),
                Err(io::Error::from(ErrorKind::TimedOut)),
                Ok(vec![4, 5]),
            ],
        };

        producer.run(source);

        assert_eq!(status.state(), ProducerState::Finished);
        assert_eq!(ring.lock().occupied_len(), 5);
    }

    #[test]
    fn test_producer_reports_failure() {
        let (producer, _, status, _) = producer_for(64, 16);
        let source = ScriptedSource {
            steps: vec![
                Ok(vec![9; 4]),
                Err(io::Error::new(ErrorKind::ConnectionReset, "peer reset")),
            ],
        };

        producer.run(source);

        assert_eq!(status.state(), ProducerState::Failed);
        assert_eq!(status.failure().as_deref(), Some("peer reset"));
        assert_eq!(status.bytes_received(), 4);
    }

    #[test]
    fn test_producer_waits_for_space_then_stops_on_cancel() {
        let (producer, ring, status, cancel) = producer_for(8, 32);
        let handle = spawn(producer, Cursor::new(vec![1u8; 32])).unwrap();

        // The ring holds 7 bytes; the producer must block on the rest
        while status.bytes_received() < 7 {
            thread::yield_now();
        }
        assert!(ring.lock().is_full());
        assert_eq!(status.state(), ProducerState::Running);

        cancel.cancel();
        handle.join().unwrap();
        assert_eq!(status.state(), ProducerState::Running);
        assert_eq!(status.bytes_received(), 7);
    }

    #[test]
    fn test_producer_resumes_when_space_frees() {
        let (producer, ring, status, _) = producer_for(8, 32);
        let data: Vec<u8> = (0..20).collect();
        let handle = spawn(producer, Cursor::new(data.clone())).unwrap();

        let mut drained = Vec::new();
        loop {
            let finished = status.state() == ProducerState::Finished;
            let mut buf = [0u8; 3];
            let n = ring.lock().read_into(&mut buf);
            drained.extend_from_slice(&buf[..n]);
            if finished && n == 0 {
                break;
            }
            thread::yield_now();
        }

        handle.join().unwrap();
        assert_eq!(drained, data);
    }

    #[test]
    fn test_shutdown_request_stops_producer() {
        let (producer, _, status, _) = producer_for(8, 32);
        status.request_shutdown();
        producer.run(Cursor::new(vec![1u8; 4]));
        assert_eq!(status.bytes_received(), 0);
        assert_eq!(status.state(), ProducerState::Running);
    }

    /// Never returns from `read` until its sender is dropped.
    struct BlockedSource(mpsc::Receiver<()>);

    impl Read for BlockedSource {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn test_join_within_detaches_blocked_producer() {
        let (producer, _, status, _) = producer_for(64, 16);
        let (unblock, blocked) = mpsc::channel();
        let handle = spawn(producer, BlockedSource(blocked)).unwrap();

        status.request_shutdown();
        let started = Instant::now();
        let joined = join_within(handle, Duration::from_millis(20), Duration::from_millis(1));

        assert!(!joined.unwrap());
        assert!(started.elapsed() < Duration::from_secs(1));
        drop(unblock);
    }

    #[test]
    fn test_join_within_joins_finished_producer() {
        let (producer, _, status, _) = producer_for(64, 16);
        let handle = spawn(producer, Cursor::new(vec![3u8; 10])).unwrap();

        let joined = join_within(handle, Duration::from_secs(5), Duration::from_millis(1));

        assert!(joined.unwrap());
        assert_eq!(status.state(), ProducerState::Finished);
    }
}
