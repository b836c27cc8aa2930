//! Kestrel NIC driver core.
//!
//! Driver for a family of bus-capable Ethernet controllers: an older
//! FIFO/programmed-I/O generation and three bus-master DMA generations
//! behind one transmit/receive/interrupt contract. The heart of the crate
//! is the DMA packet engine - descriptor-ring lifecycle, placement-safe
//! buffer binding, cache-coherency enforcement, and the coalescing
//! policies (lazy transmit interrupts, batched receive refill with
//! copy-break) that keep interrupt and doorbell rates bounded under load.
//!
//! Out of scope, consumed as interfaces only: bus enumeration and the
//! device capability database, configuration storage, the general-purpose
//! allocator, and the upward protocol stack (a smoltcp adapter is
//! provided in [`stack`]).
//!
//! # Layout
//!
//! - [`regs`] - register map, windowed access, command/ack helpers
//! - [`ring`] - descriptor layout and the TX/RX ring managers
//! - [`coalesce`] - interrupt-coalescing policy state
//! - [`pool`] - the shared packet-buffer pool
//! - [`driver`] - both generation paths and the dispatch facade
//! - [`irq`] - interrupt/worker hand-off
//! - [`checksum`] - software checksum kernels
//! - [`stack`] - smoltcp `phy::Device` adapter

#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod checksum;
pub mod coalesce;
pub mod driver;
pub mod error;
pub mod irq;
pub mod pool;
pub mod regs;
pub mod ring;
pub mod stack;
pub mod stats;
pub mod types;

#[cfg(test)]
mod testbank;
#[cfg(test)]
mod testdma;

pub use coalesce::CoalesceConfig;
pub use driver::{
    DeviceState, DmaNic, FrameSink, Nic, NicConfig, NicDriver, NicSetup, PioNic, RxFrame,
};
pub use error::{Error, Result};
pub use irq::{DeviceCell, IrqSignal};
pub use regs::{MmioBank, RegisterBank, Registers};
pub use stack::DeviceAdapter;
pub use stats::{DirStats, NicStats};
pub use types::{Generation, MacAddress, MAX_FRAME_LEN, MIN_FRAME_LEN};
