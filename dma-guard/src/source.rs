//! Interface to the externally supplied DMA allocator.
//!
//! The platform owns the real allocator; this crate only consumes it.
//! Implementations must be non-blocking: `alloc` returns `None` on
//! exhaustion and never retries or sleeps internally, so callers can treat
//! a failure as ordinary back-pressure.

use core::ptr::NonNull;

/// One allocation handed out by a [`DmaSource`].
///
/// Pairs the CPU-visible pointer with the device-visible bus address.
/// The two need not be numerically equal.
#[derive(Debug, Clone, Copy)]
pub struct DmaChunk {
    /// CPU pointer to the start of the chunk.
    pub cpu: NonNull<u8>,
    /// Bus address the device uses for the same memory.
    pub bus: u64,
    /// Length in bytes.
    pub len: usize,
}

// SAFETY: a chunk is a handle to DMA memory owned by its source; the
// source contract permits moving it between contexts.
unsafe impl Send for DmaChunk {}

impl DmaChunk {
    /// Chunk for a sub-range `[offset, offset + len)` of this chunk.
    ///
    /// # Panics
    /// Panics if the sub-range is out of bounds.
    pub fn slice(&self, offset: usize, len: usize) -> DmaChunk {
        assert!(offset + len <= self.len, "sub-chunk out of range");
        // SAFETY: the offset stays inside the allocation.
        let cpu = unsafe { NonNull::new_unchecked(self.cpu.as_ptr().add(offset)) };
        DmaChunk {
            cpu,
            bus: self.bus + offset as u64,
            len,
        }
    }
}

/// Externally supplied DMA memory allocator.
///
/// # Contract
/// - `alloc` MUST be non-blocking and return `None` on exhaustion
/// - returned chunks MUST remain valid until passed back to `free`
/// - `bus_addr` MUST translate any CPU pointer into the address the
///   device would use to reach the same byte (used when wrapping caller
///   memory that was not allocated through this source)
pub trait DmaSource {
    /// Allocate `size` bytes at the given power-of-two alignment.
    fn alloc(&mut self, size: usize, align: usize) -> Option<DmaChunk>;

    /// Return a chunk previously obtained from `alloc`.
    fn free(&mut self, chunk: DmaChunk);

    /// Bus address corresponding to an arbitrary CPU pointer.
    fn bus_addr(&self, cpu: *const u8) -> u64;
}
