//! Driver error taxonomy.
//!
//! Transient-resource conditions (`RingFull`, `Exhausted`) are handled by
//! the caller with retry/backoff or a drop; transient-timing conditions
//! (`FifoTimeout`, `CmdTimeout`) are retried a bounded number of times at
//! the call site and then counted. `DeviceFailed` is terminal: the reset
//! sequence did not bring the device back. Invariant violations (a buffer
//! that bypassed placement validation) are not errors, they assert.

use core::fmt;
use dma_guard::DmaError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No free transmit descriptor; back-pressure, try again after reclaim.
    RingFull,
    /// Packet-buffer pool exhausted; transient.
    Exhausted,
    /// Frame exceeds the wire maximum; caller bug, never truncated.
    FrameTooLarge,
    /// FIFO free-space poll exceeded its bound.
    FifoTimeout,
    /// Command-in-progress poll exceeded its bound.
    CmdTimeout,
    /// Reset failed; the device is out of service.
    DeviceFailed,
    /// DMA placement/allocation error.
    Dma(DmaError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RingFull => write!(f, "transmit ring full"),
            Self::Exhausted => write!(f, "packet buffer pool exhausted"),
            Self::FrameTooLarge => write!(f, "frame exceeds wire maximum"),
            Self::FifoTimeout => write!(f, "FIFO free-space timeout"),
            Self::CmdTimeout => write!(f, "command completion timeout"),
            Self::DeviceFailed => write!(f, "device failed to reset"),
            Self::Dma(e) => write!(f, "DMA error: {}", e),
        }
    }
}

impl From<DmaError> for Error {
    fn from(e: DmaError) -> Self {
        match e {
            DmaError::Exhausted => Error::Exhausted,
            other => Error::Dma(other),
        }
    }
}
