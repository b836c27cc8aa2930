//! Placement-safe DMA memory for bus-master device drivers.
//!
//! Bus-master Ethernet controllers put hard constraints on where a DMA
//! buffer may live: it must not cross a 64 KB-aligned boundary on parts
//! that cannot continue a burst across one, it must fit inside the
//! device's address width, and it must satisfy the part's alignment rule.
//! Handing the hardware a buffer that violates any of these corrupts data
//! silently instead of failing visibly.
//!
//! This crate is the single gate between a driver and device-visible
//! memory:
//!
//! - [`placement`] - the constraint profile and the three placement checks
//! - [`source`] - the interface to the externally supplied DMA allocator
//! - [`bounce`] - a fixed-slot arena of pre-validated bounce buffers
//! - [`buffer`] - buffer descriptors and the [`SafeDma`] front end that
//!   substitutes bounce slots transparently and performs device/CPU sync
//! - [`cache`] - tiered cache maintenance around DMA transfers
//!
//! # Design Philosophy
//!
//! - **Zero firmware dependencies**: works on any platform
//! - **Non-blocking**: allocation returns a failure value on exhaustion,
//!   never spins or retries internally
//! - **Fail loud**: a constraint violation that slips past the checks is a
//!   logic defect and asserts, it is never routed around

#![no_std]

#[cfg(test)]
extern crate std;

pub mod bounce;
pub mod buffer;
pub mod cache;
pub mod placement;
pub mod source;

pub use bounce::BounceArena;
pub use buffer::{BufferDescriptor, Direction, SafeDma};
pub use cache::{CacheOps, CoherencyTier};
pub use placement::{
    validate_address_width, validate_alignment, validate_boundary, ConstraintProfile,
};
pub use source::{DmaChunk, DmaSource};

use core::fmt;

/// Errors reported by this crate.
///
/// All variants are transient from the caller's point of view except
/// `InvalidSize`/`SegmentTooLarge`, which are caller bugs surfaced as
/// rejections rather than silent truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaError {
    /// Zero-length request.
    InvalidSize,
    /// Request exceeds the device's maximum segment size.
    SegmentTooLarge,
    /// The source (or the bounce arena) has no memory left.
    Exhausted,
    /// A backing region failed placement validation at setup time.
    BadRegion,
}

impl fmt::Display for DmaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSize => write!(f, "zero-length DMA request"),
            Self::SegmentTooLarge => write!(f, "request exceeds device segment limit"),
            Self::Exhausted => write!(f, "DMA memory exhausted"),
            Self::BadRegion => write!(f, "backing region violates placement constraints"),
        }
    }
}

/// Result type for DMA operations.
pub type Result<T> = core::result::Result<T, DmaError>;

/// Align a value up to the given power-of-two alignment.
#[inline]
pub const fn align_up(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// Align a value down to the given power-of-two alignment.
#[inline]
pub const fn align_down(val: usize, align: usize) -> usize {
    val & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_functions() {
        assert_eq!(align_up(0, 4096), 0);
        assert_eq!(align_up(1, 4096), 4096);
        assert_eq!(align_up(4096, 4096), 4096);
        assert_eq!(align_down(4097, 4096), 4096);
        assert_eq!(align_down(15, 16), 0);
    }
}
