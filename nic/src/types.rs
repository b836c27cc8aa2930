//! Shared wire-level types and controller generations.

use core::fmt;

/// Shortest frame the controller family will put on the wire (without FCS).
pub const MIN_FRAME_LEN: usize = 60;

/// Longest accepted frame (without FCS).
pub const MAX_FRAME_LEN: usize = 1514;

/// An Ethernet MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// All-zero and all-ones addresses are not valid station addresses.
    pub fn is_valid(&self) -> bool {
        self.0 != [0; 6] && self.0 != [0xFF; 6]
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Controller generation, supplied externally at init.
///
/// The oldest parts move frames through a programmed-I/O FIFO; the three
/// bus-master generations share the descriptor-ring engine and differ in
/// offload capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// FIFO parts, programmed I/O only.
    Fifo,
    /// First bus-master generation.
    DmaV1,
    /// Second bus-master generation.
    DmaV2,
    /// Third bus-master generation; adds checksum offload.
    DmaV3,
}

impl Generation {
    pub fn uses_dma(&self) -> bool {
        !matches!(self, Generation::Fifo)
    }

    /// Whether the part can insert IP/L4 checksums in hardware.
    pub fn checksum_offload(&self) -> bool {
        matches!(self, Generation::DmaV3)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Generation::Fifo => "fifo",
            Generation::DmaV1 => "dma-v1",
            Generation::DmaV2 => "dma-v2",
            Generation::DmaV3 => "dma-v3",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_validity() {
        assert!(!MacAddress::new([0; 6]).is_valid());
        assert!(!MacAddress::new([0xFF; 6]).is_valid());
        assert!(MacAddress::new([0x02, 0x60, 0x8C, 0x12, 0x34, 0x56]).is_valid());
    }

    #[test]
    fn test_mac_display() {
        extern crate std;
        use std::string::ToString;
        let mac = MacAddress::new([0x02, 0x60, 0x8C, 0xAB, 0xCD, 0xEF]);
        assert_eq!(mac.to_string(), "02:60:8c:ab:cd:ef");
    }

    #[test]
    fn test_generation_capabilities() {
        assert!(!Generation::Fifo.uses_dma());
        assert!(Generation::DmaV1.uses_dma());
        assert!(!Generation::DmaV2.checksum_offload());
        assert!(Generation::DmaV3.checksum_offload());
    }
}
