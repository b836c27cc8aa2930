//! Descriptor-ring lifecycle for the bus-master generations.
//!
//! Two rings per device. Both follow the same ownership protocol: a slot
//! belongs to exactly one side at any instant, and ownership flips only
//! when software posts (transmit) or re-arms (receive) a descriptor, or
//! when hardware writes completion status back. The managers below own
//! the ring memory, the cursors, and the per-direction counters; buffer
//! placement and coherency are delegated to `dma-guard` for every buffer
//! they bind.

pub mod descriptor;
pub mod rx;
pub mod tx;

pub use descriptor::{RxDescriptor, TxDescriptor, DESC_ALIGN, DESC_SIZE};
pub use rx::{RxConfig, RxRing};
pub use tx::TxRing;
