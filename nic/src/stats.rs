//! Per-direction traffic counters.
//!
//! Counters are owned by the ring (or FIFO path) that mutates them and
//! exported as plain copies; readers never see a torn update because the
//! snapshot is taken from worker context.

/// Counters for one traffic direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirStats {
    /// Frames moved.
    pub packets: u64,
    /// Payload bytes moved.
    pub bytes: u64,
    /// Frames dropped for errors (bad length, receive error bits,
    /// counted timeouts).
    pub errors: u64,
    /// List-pointer register writes.
    pub doorbell_writes: u64,
    /// Batched refill passes (one per pass, however many slots).
    pub bulk_refills: u64,
    /// Short frames delivered through the copy-break path.
    pub copy_breaks: u64,
}

impl DirStats {
    pub fn reset(&mut self) {
        *self = DirStats::default();
    }
}

/// Read-only snapshot of both directions for one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NicStats {
    pub tx: DirStats,
    pub rx: DirStats,
}
