use crate::error::{DemuxError, Result};
use bytes::{Buf, BytesMut};

/// Append-only FIFO of bytes.
///
/// Data is pushed at the tail and consumed from the head; `peek` exposes the
/// whole pending content as one contiguous slice.
#[derive(Debug, Default)]
pub struct ByteQueue {
    buffer: BytesMut,
}

impl ByteQueue {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Appends `data` at the tail of the queue.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Current content of the queue.
    pub fn peek(&self) -> &[u8] {
        &self.buffer[..]
    }

    /// Discards the first `count` bytes.
    ///
    /// Leaves the queue untouched and fails when fewer bytes are queued.
    pub fn pop(&mut self, count: usize) -> Result<()> {
        if count > self.buffer.len() {
            return Err(DemuxError::InvalidData(format!(
                "cannot pop {} bytes from a queue of {}",
                count,
                self.buffer.len()
            )));
        }
        self.buffer.advance(count);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
