//! DMA-source emulation for unit tests.
//!
//! Chunks are leaked heap blocks; bus addresses are synthetic (a bump
//! counter) so tests are independent of where the host heap lives and can
//! steer allocations onto placement-hostile addresses when needed.

use core::ptr::NonNull;
use dma_guard::{
    CacheOps, CoherencyTier, ConstraintProfile, DmaChunk, DmaSource, SafeDma,
};

extern crate std;
use std::vec;

pub struct TestSource {
    pub next_bus: u64,
    pub outstanding: usize,
}

impl TestSource {
    pub fn new() -> Self {
        Self {
            next_bus: 0x10_0000,
            outstanding: 0,
        }
    }
}

impl DmaSource for TestSource {
    fn alloc(&mut self, size: usize, align: usize) -> Option<DmaChunk> {
        let block = vec![0u8; size].leak();
        self.outstanding += 1;
        let bus = dma_guard::align_up(self.next_bus as usize, align) as u64;
        self.next_bus = bus + size as u64;
        Some(DmaChunk {
            cpu: NonNull::new(block.as_mut_ptr()).unwrap(),
            bus,
            len: size,
        })
    }

    fn free(&mut self, _chunk: DmaChunk) {
        self.outstanding -= 1;
    }

    fn bus_addr(&self, cpu: *const u8) -> u64 {
        cpu as u64
    }
}

/// Profile that accepts any placement, so ring/pool tests exercise the
/// data paths rather than bounce fallback.
pub fn wide_profile() -> ConstraintProfile {
    ConstraintProfile {
        address_bits: 64,
        no_boundary_crossing: false,
        max_segment: 65535,
        scatter_gather: true,
    }
}

pub fn safe_dma() -> SafeDma<TestSource> {
    SafeDma::new(
        TestSource::new(),
        wide_profile(),
        CacheOps::new(CoherencyTier::Coherent, CacheOps::DEFAULT_LINE_SIZE),
        16,
        2048,
    )
    .unwrap()
}
