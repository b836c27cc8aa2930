//! Upward driver contract.
//!
//! Both generations sit behind the same trait so the rest of the system
//! never branches on hardware age. All methods are non-blocking.

use crate::error::Result;
use crate::stats::NicStats;
use crate::types::MacAddress;
use alloc::vec::Vec;
use dma_guard::BufferDescriptor;

/// A received frame handed upward.
pub enum RxFrame {
    /// Short frame copied out of the ring buffer (copy-break path); the
    /// ring buffer was recycled in place.
    Copied(Vec<u8>),
    /// Full-size frame delivered in its pool buffer; ownership transfers
    /// to the consumer, who must hand the buffer back via the driver's
    /// `recycle` once done.
    Pooled { buf: BufferDescriptor, len: usize },
}

impl RxFrame {
    pub fn data(&self) -> &[u8] {
        match self {
            RxFrame::Copied(v) => v,
            RxFrame::Pooled { buf, len } => &buf.as_slice()[..*len],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RxFrame::Copied(v) => v.len(),
            RxFrame::Pooled { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer of received frames.
///
/// # Contract
/// - `deliver` is invoked once per frame, from worker context
/// - MUST NOT block; queue and return
pub trait FrameSink {
    fn deliver(&mut self, frame: RxFrame);
}

/// Collecting sink; handy for adapters and tests.
impl FrameSink for Vec<RxFrame> {
    fn deliver(&mut self, frame: RxFrame) {
        self.push(frame);
    }
}

/// The generation-agnostic device interface.
///
/// # Contract
/// - `transmit` MUST return immediately; `RingFull`/`Exhausted` are
///   back-pressure, not failures
/// - `service` performs at most `budget` units of work, then yields
/// - `handle_interrupt` is interrupt-context safe: it only acknowledges
///   the hardware and records pending work
pub trait NicDriver {
    fn mac_address(&self) -> MacAddress;

    fn link_up(&mut self) -> bool;

    /// Queue one Ethernet frame for transmission.
    fn transmit(&mut self, frame: &[u8]) -> Result<()>;

    /// Drain completed work; returns frames processed.
    fn service(&mut self, budget: usize, sink: &mut dyn FrameSink) -> usize;

    /// Minimal interrupt-context handler; true if work is now pending.
    fn handle_interrupt(&mut self) -> bool;

    /// Counter snapshot.
    fn stats(&self) -> NicStats;
}
