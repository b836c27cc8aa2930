//! Device drivers for both controller generations.
//!
//! `pio` drives the FIFO parts, `dma` the bus-master parts, and `facade`
//! selects between them once at init and carries the shared fault state
//! machine. `traits` is the generation-agnostic contract upward.

pub mod dma;
pub mod facade;
pub mod pio;
pub mod traits;

pub use dma::DmaNic;
pub use facade::{DeviceState, Nic, NicSetup};
pub use pio::PioNic;
pub use traits::{FrameSink, NicDriver, RxFrame};

use crate::coalesce::CoalesceConfig;

/// Driver tunables, one struct for both paths.
#[derive(Debug, Clone, Copy)]
pub struct NicConfig {
    /// Transmit ring slots (power of two; bus-master parts).
    pub tx_ring_size: usize,
    /// Receive ring slots (power of two; bus-master parts).
    pub rx_ring_size: usize,
    /// Packet buffer size; covers a full frame plus slack.
    pub buffer_size: usize,
    /// Pool population shared by both directions.
    pub pool_buffers: usize,
    /// Bounce slots reserved for placement-hostile memory.
    pub bounce_slots: usize,
    /// Bound on every register poll loop.
    pub poll_limit: usize,
    /// Interrupt/refill coalescing tunables.
    pub coalesce: CoalesceConfig,
    /// Use hardware checksum insertion when the part supports it.
    pub offload_checksums: bool,
    /// CPU capability flag: wide loads in the software checksum loop.
    pub wide_checksum_loop: bool,
}

impl Default for NicConfig {
    fn default() -> Self {
        Self {
            tx_ring_size: 32,
            rx_ring_size: 32,
            buffer_size: 1536,
            pool_buffers: 80,
            bounce_slots: 16,
            poll_limit: 4096,
            coalesce: CoalesceConfig::default(),
            offload_checksums: true,
            wide_checksum_loop: true,
        }
    }
}
