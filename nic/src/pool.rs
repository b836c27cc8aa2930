//! Packet-buffer pool.
//!
//! One pool per device, shared by the transmit and receive sides. Every
//! buffer goes through placement validation once, at pool construction;
//! afterwards buffers only cycle between the pool, the rings, and the
//! delivery path. Take/recycle are non-blocking by construction.

use crate::error::Result;
use alloc::vec::Vec;
use dma_guard::{BufferDescriptor, Direction, DmaSource, SafeDma};

/// Alignment for packet buffers; covers the whole controller family.
pub const BUFFER_ALIGN: usize = 16;

pub struct BufferPool {
    free: Vec<BufferDescriptor>,
    total: usize,
    buffer_size: usize,
}

impl BufferPool {
    /// Preallocate `count` buffers of `buffer_size` bytes.
    pub fn new<S: DmaSource>(
        dma: &mut SafeDma<S>,
        count: usize,
        buffer_size: usize,
    ) -> Result<Self> {
        let mut free = Vec::with_capacity(count);
        for _ in 0..count {
            free.push(dma.allocate(buffer_size, BUFFER_ALIGN, Direction::Bidirectional)?);
        }
        Ok(Self {
            free,
            total: count,
            buffer_size,
        })
    }

    /// Take a buffer; `None` when the pool is dry.
    pub fn take(&mut self) -> Option<BufferDescriptor> {
        self.free.pop()
    }

    /// Return a buffer to the pool.
    pub fn recycle(&mut self, buf: BufferDescriptor) {
        debug_assert_eq!(buf.len(), self.buffer_size, "foreign buffer recycled");
        assert!(self.free.len() < self.total, "pool over-filled");
        self.free.push(buf);
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Tear the pool down, releasing backing storage for every buffer
    /// currently home. Buffers still in flight are the caller's problem.
    pub fn release_all<S: DmaSource>(mut self, dma: &mut SafeDma<S>) {
        for buf in self.free.drain(..) {
            dma.release(buf);
        }
    }
}
