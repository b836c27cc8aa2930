//! Hardware descriptor layout.
//!
//! One descriptor per ring slot: next-link bus address, status/ownership
//! word, buffer bus address, buffer length. The status word is the
//! ownership handshake - software sets the own bit when posting, hardware
//! clears it and sets the complete bit when done - so every field the
//! device may touch is accessed volatilely.

use bit_field::BitField;
use static_assertions::const_assert_eq;
use volatile::Volatile;

/// Descriptor footprint in bytes; the layout is fixed by hardware.
pub const DESC_SIZE: usize = 16;

/// Descriptors must sit on a 16-byte boundary.
pub const DESC_ALIGN: usize = 16;

// Status-word bits shared by both directions.
/// Hardware owns the descriptor.
pub const DESC_OWN: u32 = 1 << 31;
/// Hardware finished with the descriptor.
pub const DESC_COMPLETE: u32 = 1 << 15;
/// Hardware reported an error for this descriptor.
pub const DESC_ERROR: u32 = 1 << 14;

// Transmit-only control bits.
/// Raise a completion interrupt for this descriptor.
pub const TX_REQUEST_INTERRUPT: u32 = 1 << 30;
/// Insert the IP header checksum in hardware.
pub const TX_ADD_IP_CHECKSUM: u32 = 1 << 29;
/// Insert the TCP/UDP checksum in hardware.
pub const TX_ADD_L4_CHECKSUM: u32 = 1 << 28;

// Receive-only status bits written back by hardware.
pub const RX_IP_CHECKSUM_OK: u32 = 1 << 16;
pub const RX_L4_CHECKSUM_OK: u32 = 1 << 17;

const LEN_BITS: core::ops::Range<usize> = 0..14;

/// One transmit ring slot.
#[repr(C)]
pub struct TxDescriptor {
    next: Volatile<u32>,
    status: Volatile<u32>,
    addr: Volatile<u32>,
    len: Volatile<u32>,
}

const_assert_eq!(core::mem::size_of::<TxDescriptor>(), DESC_SIZE);

impl TxDescriptor {
    pub fn clear(&mut self) {
        self.status.write(0);
        self.addr.write(0);
        self.len.write(0);
    }

    pub fn set_next(&mut self, bus: u32) {
        self.next.write(bus);
    }

    /// Bind a buffer and hand the slot to hardware.
    ///
    /// The status write comes last: it is the ownership transfer.
    pub fn post(&mut self, bus: u64, frame_len: usize, flags: u32) {
        self.addr.write(bus as u32);
        self.len.write(*0u32.set_bits(LEN_BITS, frame_len as u32));
        self.status.write(DESC_OWN | flags);
    }

    pub fn is_hw_owned(&self) -> bool {
        self.status.read() & DESC_OWN != 0
    }

    pub fn is_complete(&self) -> bool {
        self.status.read() & DESC_COMPLETE != 0
    }

    pub fn has_error(&self) -> bool {
        self.status.read() & DESC_ERROR != 0
    }

    pub fn raw_status(&self) -> u32 {
        self.status.read()
    }

    /// Raw status store; diagnostics and device emulation only.
    pub fn set_raw_status(&mut self, value: u32) {
        self.status.write(value);
    }
}

/// One receive ring slot.
#[repr(C)]
pub struct RxDescriptor {
    next: Volatile<u32>,
    status: Volatile<u32>,
    addr: Volatile<u32>,
    len: Volatile<u32>,
}

const_assert_eq!(core::mem::size_of::<RxDescriptor>(), DESC_SIZE);

impl RxDescriptor {
    pub fn clear(&mut self) {
        self.status.write(0);
        self.addr.write(0);
        self.len.write(0);
    }

    pub fn set_next(&mut self, bus: u32) {
        self.next.write(bus);
    }

    /// Bind a buffer and offer the slot to hardware.
    pub fn arm(&mut self, bus: u64, capacity: usize) {
        self.addr.write(bus as u32);
        self.len.write(*0u32.set_bits(LEN_BITS, capacity as u32));
        self.status.write(DESC_OWN);
    }

    /// Take the slot back from hardware without rebinding.
    pub fn release(&mut self) {
        self.status.write(0);
    }

    pub fn is_hw_owned(&self) -> bool {
        self.status.read() & DESC_OWN != 0
    }

    pub fn is_complete(&self) -> bool {
        self.status.read() & DESC_COMPLETE != 0
    }

    pub fn has_error(&self) -> bool {
        self.status.read() & DESC_ERROR != 0
    }

    /// Received frame length from the write-back status.
    pub fn frame_len(&self) -> usize {
        self.status.read().get_bits(LEN_BITS) as usize
    }

    pub fn raw_status(&self) -> u32 {
        self.status.read()
    }

    /// Raw status store; diagnostics and device emulation only.
    pub fn set_raw_status(&mut self, value: u32) {
        self.status.write(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_ownership_handshake() {
        let mut d = TxDescriptor {
            next: Volatile::new(0),
            status: Volatile::new(0),
            addr: Volatile::new(0),
            len: Volatile::new(0),
        };
        d.post(0x1000, 64, TX_REQUEST_INTERRUPT);
        assert!(d.is_hw_owned());
        assert!(!d.is_complete());
        assert!(d.raw_status() & TX_REQUEST_INTERRUPT != 0);

        // Hardware-side completion.
        d.set_raw_status(DESC_COMPLETE);
        assert!(!d.is_hw_owned());
        assert!(d.is_complete());
    }

    #[test]
    fn test_rx_write_back_length() {
        let mut d = RxDescriptor {
            next: Volatile::new(0),
            status: Volatile::new(0),
            addr: Volatile::new(0),
            len: Volatile::new(0),
        };
        d.arm(0x2000, 1536);
        assert!(d.is_hw_owned());

        d.set_raw_status(DESC_COMPLETE | 128);
        assert!(d.is_complete());
        assert!(!d.has_error());
        assert_eq!(d.frame_len(), 128);
    }
}
