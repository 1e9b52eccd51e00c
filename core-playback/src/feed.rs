//! # Decoder Feed
//!
//! Implements the decoder's input side: every call hands the engine a
//! contiguous chunk of the shared ring buffer.
//!
//! Per call:
//!
//! 1. lock the ring
//! 2. move `read` to the engine's reported `next_frame`, or realign if that
//!    position is not ahead of `read` (the engine lost its place)
//! 3. while there is nothing new to offer, release the lock, sleep one poll
//!    interval and re-check, honouring cancellation and producer status
//! 4. guarantee `max_chunk + 1` addressable bytes at `read`
//! 5. copy up to `max_chunk` contiguous bytes into the view
//!
//! The lock is never held across a sleep.

use crate::engine::{Flow, StreamView};
use crate::error::{PlaybackError, Result};
use crate::producer::{ProducerState, ProducerStatus};
use crate::ring_buffer::{RingBuffer, SharedRingBuffer};
use crate::streaming::CancelFlag;
use bridge_traits::StreamObserver;
use bytes::Bytes;
use parking_lot::MutexGuard;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Counters kept by the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub sync_losses: u64,
    pub realignments: u64,
    pub starvation_waits: u64,
    pub bytes_offered: u64,
}

/// Decoder input adapter over the shared ring buffer.
pub struct FeedAdapter {
    ring: SharedRingBuffer,
    producer: Arc<ProducerStatus>,
    cancel: CancelFlag,
    observer: Arc<dyn StreamObserver>,
    max_chunk: usize,
    poll_interval: Duration,
    max_wait_polls: Option<u32>,
    stats: FeedStats,
}

impl FeedAdapter {
    pub fn new(
        ring: SharedRingBuffer,
        producer: Arc<ProducerStatus>,
        cancel: CancelFlag,
        observer: Arc<dyn StreamObserver>,
    ) -> Self {
        Self {
            ring,
            producer,
            cancel,
            observer,
            max_chunk: 3072,
            poll_interval: Duration::from_micros(300),
            max_wait_polls: None,
            stats: FeedStats::default(),
        }
    }

    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_wait_polls(mut self, max_wait_polls: Option<u32>) -> Self {
        self.max_wait_polls = max_wait_polls;
        self
    }

    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    /// Refill `view` for the decoder.
    ///
    /// Returns `Ok(Flow::Stop)` on cancellation or at end of stream. Fails
    /// when the producer failed, the wait bound was exceeded, the ring could
    /// not be realigned, or the decoder left a full `max_chunk` view untouched.
    pub fn fill(&mut self, view: &mut StreamView) -> Result<Flow> {
        let mut ring = self.ring.lock();

        // Whether the engine left the previous view untouched
        let stalled = !view.data.is_empty()
            && view.next_frame.map_or(true, |next| next <= view.start);
        let offered_len = view.data.len();

        // A larger view is never offered, so waiting cannot help
        if stalled && offered_len >= self.max_chunk {
            warn!(chunk = self.max_chunk, "Decoder consumed nothing of a full chunk");
            return Err(PlaybackError::NoProgress {
                chunk: self.max_chunk,
            });
        }

        if let Some(next) = view.next_frame.take() {
            if !ring.advance_read_to(next) {
                if next != ring.read_index() {
                    self.stats.sync_losses += 1;
                    debug!(
                        next_frame = next,
                        read = ring.read_index(),
                        "Decoder position behind read cursor, realigning"
                    );
                }
                if ring.read_index() != 0 {
                    self.stats.realignments += 1;
                }
                ring.realign()?;
            }
        }

        let mut polls: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                debug!("Feed observed cancellation");
                self.leave_wait(&mut ring, polls);
                return Ok(Flow::Stop);
            }

            // Consumer alone removes bytes, so occupancy only grows while waiting
            let nothing_new = ring.is_empty() || (stalled && ring.occupied_len() <= offered_len);
            if !nothing_new {
                break;
            }

            match self.producer.state() {
                ProducerState::Finished => {
                    debug!(leftover = ring.occupied_len(), "Stream data exhausted");
                    self.leave_wait(&mut ring, polls);
                    return Ok(Flow::Stop);
                }
                ProducerState::Failed => {
                    let message = self
                        .producer
                        .failure()
                        .unwrap_or_else(|| "unknown source failure".to_string());
                    self.leave_wait(&mut ring, polls);
                    return Err(PlaybackError::SourceFailed(message));
                }
                ProducerState::Running => {}
            }

            if let Some(max) = self.max_wait_polls {
                if polls >= max {
                    warn!(polls, "Giving up waiting for stream data");
                    self.leave_wait(&mut ring, polls);
                    return Err(PlaybackError::RetriesExhausted { attempts: polls });
                }
            }

            let entering = polls == 0;
            if entering {
                self.stats.starvation_waits += 1;
                info!(
                    occupied = ring.occupied_len(),
                    "Waiting for stream data"
                );
            }
            polls += 1;

            let observer = &self.observer;
            let interval = self.poll_interval;
            MutexGuard::unlocked(&mut ring, || {
                if entering {
                    observer.on_buffering(true);
                }
                thread::sleep(interval);
            });
        }
        self.leave_wait(&mut ring, polls);

        let before = ring.read_index();
        ring.require_contiguous_read(self.max_chunk + 1)?;
        if before != ring.read_index() {
            self.stats.realignments += 1;
        }

        let data = Bytes::copy_from_slice(ring.peek_contiguous(self.max_chunk));
        self.stats.bytes_offered += data.len() as u64;

        view.start = ring.read_index();
        view.data = data;
        view.next_frame = None;

        Ok(Flow::Continue)
    }

    fn leave_wait(&self, ring: &mut MutexGuard<'_, RingBuffer>, polls: u32) {
        if polls > 0 {
            let observer = &self.observer;
            MutexGuard::unlocked(ring, || observer.on_buffering(false));
        }
    }
}
