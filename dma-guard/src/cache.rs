//! Cache maintenance around DMA transfers.
//!
//! The tier is selected once at init from platform capability input and
//! never re-derived. On hardware-coherent platforms (and on parts with no
//! cache at all) both operations are no-ops; on platforms with explicit
//! maintenance, skipping either call is a silent-corruption defect, which
//! is why the operation counters exist: tests assert that every buffer
//! transition performed its matching call.

use core::sync::atomic::{AtomicU64, Ordering};

/// What cache maintenance the platform requires around DMA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoherencyTier {
    /// Hardware keeps caches coherent with DMA; nothing to do.
    Coherent,
    /// Flush before the device reads, invalidate after the device writes.
    Explicit,
    /// No cache present; nothing to do.
    Uncached,
}

/// Cache maintenance executor for one device.
pub struct CacheOps {
    tier: CoherencyTier,
    line_size: usize,
    flushes: AtomicU64,
    invalidates: AtomicU64,
}

impl CacheOps {
    /// Default cache line size when the platform does not report one.
    pub const DEFAULT_LINE_SIZE: usize = 64;

    pub const fn new(tier: CoherencyTier, line_size: usize) -> Self {
        Self {
            tier,
            line_size,
            flushes: AtomicU64::new(0),
            invalidates: AtomicU64::new(0),
        }
    }

    pub fn tier(&self) -> CoherencyTier {
        self.tier
    }

    /// Make CPU-written data visible to the device.
    ///
    /// Flushes every cache line covering `[addr, addr + len)` on the
    /// `Explicit` tier.
    pub fn prepare_for_device(&self, addr: *const u8, len: usize) {
        if self.tier == CoherencyTier::Explicit {
            self.walk_lines(addr, len);
            self.flushes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Make device-written data visible to the CPU.
    ///
    /// Invalidates every covering cache line on the `Explicit` tier so a
    /// stale cached copy cannot shadow what the device wrote.
    pub fn complete_from_device(&self, addr: *const u8, len: usize) {
        if self.tier == CoherencyTier::Explicit {
            self.walk_lines(addr, len);
            self.invalidates.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of flush operations performed.
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Number of invalidate operations performed.
    pub fn invalidates(&self) -> u64 {
        self.invalidates.load(Ordering::Relaxed)
    }

    fn walk_lines(&self, addr: *const u8, len: usize) {
        if len == 0 {
            return;
        }
        let start = addr as usize & !(self.line_size - 1);
        let end = addr as usize + len;
        let mut line = start;
        while line < end {
            // SAFETY: caller guarantees [addr, addr+len) is valid memory;
            // the covering lines are therefore mapped.
            unsafe { cache_line_op(line as *const u8) };
            line += self.line_size;
        }
        fence();
    }
}

/// Flush/invalidate one cache line.
///
/// x86 exposes a single writeback-and-invalidate instruction, so the same
/// primitive serves both directions.
#[cfg(target_arch = "x86_64")]
#[inline]
unsafe fn cache_line_op(addr: *const u8) {
    core::arch::asm!(
        "clflush [{0}]",
        in(reg) addr,
        options(nostack, preserves_flags)
    );
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
unsafe fn cache_line_op(_addr: *const u8) {}

#[cfg(target_arch = "x86_64")]
#[inline]
fn fence() {
    // Order the line operations against the upcoming MMIO doorbell.
    core::sync::atomic::fence(Ordering::SeqCst);
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
fn fence() {}
