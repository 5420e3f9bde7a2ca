use micro_lfs_store::{ObjectSink, StoreError};

use crate::UploadError;
use crate::relay::{ReadStatus, Source};

/// Default capacity of a [`RelayBuffer`].
pub const DEFAULT_CAPACITY: usize = 8 * 1024;

/// Consecutive zero byte writes after which [`RelayBuffer::flush_into`] gives up on a sink.
///
/// Only the final flush of an exhausted source waits on the sink like this; while the source
/// is still streaming a stalled sink just leaves the bytes pending.
pub const MAX_STALLED_WRITES: usize = 16;

/// Fixed capacity staging area between a [`Source`] and an [`ObjectSink`].
///
/// Bytes between `read_pos` and `write_pos` have been read from the source but not yet
/// accepted by the sink. Reads append behind `write_pos`, sink writes consume from
/// `read_pos`; the pending bytes are moved to the front once the tail is exhausted.
#[derive(Debug)]
pub struct RelayBuffer {
    buf: Box<[u8]>,
    read_pos: usize,
    write_pos: usize,
}

impl RelayBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a buffer of `capacity` bytes, at least one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: vec![0u8; capacity.max(1)].into_boxed_slice(), read_pos: 0, write_pos: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of bytes read but not yet written.
    pub fn len(&self) -> usize {
        self.write_pos - self.read_pos
    }

    pub fn is_empty(&self) -> bool {
        self.read_pos == self.write_pos
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    fn compact(&mut self) {
        if self.read_pos == 0 {
            return;
        }
        self.buf.copy_within(self.read_pos..self.write_pos, 0);
        self.write_pos -= self.read_pos;
        self.read_pos = 0;
    }

    /// Reads from `source` into the free space. A full buffer reads nothing.
    pub fn fill_from<S: Source + ?Sized>(&mut self, source: &mut S) -> Result<ReadStatus, UploadError> {
        if self.write_pos == self.capacity() {
            self.compact();
        }

        let status = source.try_read(&mut self.buf[self.write_pos..])?;
        if let ReadStatus::Read(n) = status {
            debug_assert!(self.write_pos + n <= self.capacity());
            self.write_pos += n;
        }
        Ok(status)
    }

    /// Offers the pending bytes to `sink` once, returning how many it accepted.
    pub fn drain_into<K: ObjectSink + ?Sized>(&mut self, sink: &mut K) -> Result<usize, StoreError> {
        if self.is_empty() {
            return Ok(0);
        }

        let accepted = sink.write(&self.buf[self.read_pos..self.write_pos])?;
        debug_assert!(accepted <= self.len());
        self.read_pos += accepted.min(self.len());
        if self.is_empty() {
            self.read_pos = 0;
            self.write_pos = 0;
        }
        Ok(accepted)
    }

    /// Drains until empty, adding every accepted byte to `transferred`.
    ///
    /// Fails with a `WriteZero` storage error once the sink accepted nothing
    /// [`MAX_STALLED_WRITES`] times in a row.
    pub fn flush_into<K: ObjectSink + ?Sized>(
        &mut self,
        sink: &mut K,
        transferred: &mut u64,
    ) -> Result<(), UploadError> {
        let mut stalled = 0;
        while !self.is_empty() {
            let accepted = self.drain_into(sink)?;
            *transferred += accepted as u64;

            if accepted == 0 {
                stalled += 1;
                if stalled >= MAX_STALLED_WRITES {
                    return Err(UploadError::write_zero(stalled));
                }
            } else {
                stalled = 0;
            }
        }
        Ok(())
    }
}

impl Default for RelayBuffer {
    fn default() -> Self {
        Self::new()
    }
}
