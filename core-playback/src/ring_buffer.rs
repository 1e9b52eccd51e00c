//! # Ring Buffer for Compressed Stream Bytes
//!
//! Fixed-capacity circular byte store sitting between the network producer
//! and the decoder feed.
//!
//! ## Design
//!
//! - **Cursors**: `read` and `write` are indices into an owned byte array
//! - **Capacity**: fixed at creation; one slot is kept free so that
//!   `read == write` always means empty and "write one behind read" means full
//! - **Contiguity**: the decoder needs a linear view, so the buffer can be
//!   [`realign`](RingBuffer::realign)ed to move the occupied region to index 0
//! - **Locking**: the structure itself is not synchronized; share it as a
//!   [`SharedRingBuffer`] and hold the lock for any multi-field access
//!
//! ## Usage
//!
//! ```rust
//! use core_playback::ring_buffer::RingBuffer;
//!
//! let mut ring = RingBuffer::new(16).unwrap();
//! assert_eq!(ring.write_from(&[1, 2, 3, 4]), 4);
//!
//! assert_eq!(ring.peek_contiguous(2), &[1, 2]);
//! assert_eq!(ring.consume(2), 2);
//! assert_eq!(ring.occupied_len(), 2);
//! ```

use crate::error::{PlaybackError, Result};
use std::sync::Arc;
use tracing::trace;

/// Ring buffer shared between the producer thread and the decoder feed.
pub type SharedRingBuffer = Arc<parking_lot::Mutex<RingBuffer>>;

// ============================================================================
// RingBuffer
// ============================================================================

#[derive(Debug)]
pub struct RingBuffer {
    storage: Vec<u8>,
    read: usize,
    write: usize,
}

impl RingBuffer {
    /// Create an empty ring buffer backed by `capacity` bytes.
    ///
    /// Usable capacity is `capacity - 1`. Fails with
    /// [`PlaybackError::InvalidCapacity`] below two bytes and with
    /// [`PlaybackError::Allocation`] when the storage cannot be reserved.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < 2 {
            return Err(PlaybackError::InvalidCapacity(capacity));
        }

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|_| PlaybackError::Allocation { bytes: capacity })?;
        storage.resize(capacity, 0);

        Ok(Self {
            storage,
            read: 0,
            write: 0,
        })
    }

    /// Wrap a new ring buffer for sharing across threads.
    pub fn shared(capacity: usize) -> Result<SharedRingBuffer> {
        Ok(Arc::new(parking_lot::Mutex::new(Self::new(capacity)?)))
    }

    /// Total storage size in bytes (one more than the usable capacity).
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn read_index(&self) -> usize {
        self.read
    }

    pub fn write_index(&self) -> usize {
        self.write
    }

    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    pub fn is_full(&self) -> bool {
        self.occupied_len() == self.capacity() - 1
    }

    /// Bytes between `read` and `write`, walking forward circularly.
    pub fn occupied_len(&self) -> usize {
        if self.write >= self.read {
            self.write - self.read
        } else {
            self.capacity() - self.read + self.write
        }
    }

    /// Bytes that can still be written before the buffer is full.
    pub fn available(&self) -> usize {
        self.capacity() - 1 - self.occupied_len()
    }

    /// Bytes readable at `read` without wrapping.
    pub fn contiguous_readable(&self) -> usize {
        if self.write >= self.read {
            self.write - self.read
        } else {
            self.capacity() - self.read
        }
    }

    /// Bytes writable at `write` without wrapping.
    ///
    /// With `read` at index 0 the last slot stays free, otherwise the write
    /// cursor would wrap onto `read` and the buffer would look empty.
    pub fn contiguous_writable(&self) -> usize {
        if self.write >= self.read {
            let to_end = self.capacity() - self.write;
            if self.read == 0 {
                to_end - 1
            } else {
                to_end
            }
        } else {
            self.read - self.write - 1
        }
    }

    /// Make sure `n` bytes starting at `read` can be addressed without
    /// crossing the end of storage, realigning if they could not.
    ///
    /// After this returns `Ok`, `read + n < capacity` or `read == 0`. It does
    /// not wait for `n` bytes to actually be present.
    pub fn require_contiguous_read(&mut self, n: usize) -> Result<()> {
        if n > self.capacity() {
            return Err(PlaybackError::ContiguousReadTooLarge {
                requested: n,
                capacity: self.capacity(),
            });
        }

        if self.read + n >= self.capacity() {
            self.realign()?;
        }

        Ok(())
    }

    /// Move the occupied region so that it starts at index 0.
    ///
    /// Content and length are preserved. A no-op when `read` is already 0.
    /// For wrapped data the tail at the start of storage is copied aside
    /// first; if that scratch allocation fails nothing has been touched yet.
    pub fn realign(&mut self) -> Result<()> {
        if self.read == 0 {
            return Ok(());
        }

        if self.is_empty() {
            self.read = 0;
            self.write = 0;
            return Ok(());
        }

        if self.write > self.read {
            let len = self.write - self.read;
            self.storage.copy_within(self.read..self.write, 0);
            self.read = 0;
            self.write = len;
        } else {
            let capacity = self.capacity();
            let suffix_len = self.write;
            let prefix_len = capacity - self.read;

            let mut suffix = Vec::new();
            suffix
                .try_reserve_exact(suffix_len)
                .map_err(|_| PlaybackError::Allocation { bytes: suffix_len })?;
            suffix.extend_from_slice(&self.storage[..suffix_len]);

            self.storage.copy_within(self.read..capacity, 0);
            self.storage[prefix_len..prefix_len + suffix_len].copy_from_slice(&suffix);
            self.read = 0;
            self.write = prefix_len + suffix_len;
        }

        trace!(occupied = self.write, "Ring buffer realigned");
        Ok(())
    }

    /// Up to `max` bytes of the contiguous readable region.
    pub fn peek_contiguous(&self, max: usize) -> &[u8] {
        let len = self.contiguous_readable().min(max);
        &self.storage[self.read..self.read + len]
    }

    /// Move `read` forward by up to `n` bytes. Returns the bytes skipped.
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.occupied_len());
        self.read = (self.read + n) % self.capacity();
        n
    }

    /// Set `read` to `index` if it lies strictly inside the current
    /// contiguous readable region's span `(read, capacity)` and does not pass
    /// `write`.
    ///
    /// Returns `false` (and leaves the buffer unchanged) otherwise.
    pub fn advance_read_to(&mut self, index: usize) -> bool {
        if index <= self.read || index >= self.capacity() {
            return false;
        }

        let step = index - self.read;
        if step > self.occupied_len() {
            return false;
        }

        self.read = index;
        true
    }

    /// Copy as much of `src` as fits, wrapping at the end of storage.
    ///
    /// Returns the number of bytes accepted.
    pub fn write_from(&mut self, src: &[u8]) -> usize {
        let mut written = 0;

        // At most two passes: up to the end of storage, then from index 0.
        for _ in 0..2 {
            let chunk = self.contiguous_writable().min(src.len() - written);
            if chunk == 0 {
                break;
            }

            self.storage[self.write..self.write + chunk]
                .copy_from_slice(&src[written..written + chunk]);
            self.write = (self.write + chunk) % self.capacity();
            written += chunk;
        }

        written
    }

    /// Copy up to `dst.len()` bytes out of the buffer and consume them.
    #[cfg(test)]
    pub(crate) fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let mut read = 0;

        for _ in 0..2 {
            let chunk = self.contiguous_readable().min(dst.len() - read);
            if chunk == 0 {
                break;
            }

            dst[read..read + chunk].copy_from_slice(&self.storage[self.read..self.read + chunk]);
            self.read = (self.read + chunk) % self.capacity();
            read += chunk;
        }

        read
    }
}
