//! Register map and access layer for the controller family.
//!
//! The family exposes a small I/O aperture: offsets below 0x10 are a
//! windowed bank (eight overlays selected through the command register),
//! everything above is window-independent. A window must be selected once
//! before a burst of accesses to its registers; re-selecting per access
//! works but doubles the register-write rate, so the wrapper tracks the
//! current window and only issues the select command on a change.

use crate::error::{Error, Result};
use crate::types::MacAddress;

/// Command register (write) / status register (read).
pub const CMD: u16 = 0x0E;
pub const STATUS: u16 = 0x0E;

// Command opcodes live in bits 15:11; the argument in bits 10:0.
pub const CMD_GLOBAL_RESET: u16 = 0 << 11;
pub const CMD_SELECT_WINDOW: u16 = 1 << 11;
pub const CMD_RX_DISABLE: u16 = 3 << 11;
pub const CMD_RX_ENABLE: u16 = 4 << 11;
pub const CMD_RX_RESET: u16 = 5 << 11;
pub const CMD_RX_DISCARD: u16 = 8 << 11;
pub const CMD_TX_ENABLE: u16 = 9 << 11;
pub const CMD_TX_DISABLE: u16 = 10 << 11;
pub const CMD_TX_RESET: u16 = 11 << 11;
pub const CMD_ACK_INTR: u16 = 13 << 11;
pub const CMD_SET_INTR_MASK: u16 = 14 << 11;

// Status bits. The low eleven double as interrupt sources and as the
// argument to the ack/mask commands.
pub const INT_LATCH: u16 = 1 << 0;
pub const HOST_ERROR: u16 = 1 << 1;
pub const TX_COMPLETE: u16 = 1 << 2;
pub const RX_COMPLETE: u16 = 1 << 4;
pub const RX_EARLY: u16 = 1 << 5;
pub const INT_REQUESTED: u16 = 1 << 6;
pub const UPDATE_STATS: u16 = 1 << 7;
pub const DN_COMPLETE: u16 = 1 << 9;
pub const UP_COMPLETE: u16 = 1 << 10;
pub const CMD_IN_PROGRESS: u16 = 1 << 12;

/// Every acknowledgeable source.
pub const ACK_ALL: u16 = 0x07FF;

/// Default worker-serviced interrupt set for the bus-master parts.
pub const DMA_INT_MASK: u16 =
    INT_LATCH | HOST_ERROR | TX_COMPLETE | UP_COMPLETE | DN_COMPLETE | INT_REQUESTED;

/// Default interrupt set for the FIFO parts.
pub const PIO_INT_MASK: u16 = INT_LATCH | HOST_ERROR | TX_COMPLETE | RX_COMPLETE;

// Window 1: FIFO data path (PIO parts).
pub const W1_TX_FIFO: u16 = 0x00;
pub const W1_RX_FIFO: u16 = 0x00;
pub const W1_RX_STATUS: u16 = 0x08;
pub const W1_TX_FREE: u16 = 0x0C;

// Window 1 RX status bits.
pub const RX_STATUS_INCOMPLETE: u16 = 1 << 15;
pub const RX_STATUS_ERROR: u16 = 1 << 14;
pub const RX_STATUS_LEN_MASK: u16 = 0x07FF;

// Window 2: station address.
pub const W2_STATION_ADDR: u16 = 0x00;

// Window 4: diagnostics and media.
pub const W4_MEDIA_STATUS: u16 = 0x0A;
pub const MEDIA_LINK_BEAT: u16 = 1 << 11;

// Window-independent registers (bus-master parts).
pub const DMA_CTRL: u16 = 0x20;
pub const TX_LIST_PTR: u16 = 0x24;
pub const RX_LIST_PTR: u16 = 0x38;

/// Raw register access, word and doubleword.
///
/// Implemented over MMIO for real hardware and by a mock bank in tests.
pub trait RegisterBank {
    fn read16(&mut self, offset: u16) -> u16;
    fn write16(&mut self, offset: u16, value: u16);
    fn read32(&mut self, offset: u16) -> u32;
    fn write32(&mut self, offset: u16, value: u32);
}

/// Memory-mapped register bank.
pub struct MmioBank {
    base: *mut u8,
}

impl MmioBank {
    /// # Safety
    /// `base` must map the device's register aperture for the lifetime of
    /// the bank.
    pub unsafe fn new(base: *mut u8) -> Self {
        Self { base }
    }
}

impl RegisterBank for MmioBank {
    fn read16(&mut self, offset: u16) -> u16 {
        // SAFETY: constructor contract; offsets come from this module.
        unsafe { core::ptr::read_volatile(self.base.add(offset as usize) as *const u16) }
    }

    fn write16(&mut self, offset: u16, value: u16) {
        unsafe { core::ptr::write_volatile(self.base.add(offset as usize) as *mut u16, value) }
    }

    fn read32(&mut self, offset: u16) -> u32 {
        unsafe { core::ptr::read_volatile(self.base.add(offset as usize) as *const u32) }
    }

    fn write32(&mut self, offset: u16, value: u32) {
        unsafe { core::ptr::write_volatile(self.base.add(offset as usize) as *mut u32, value) }
    }
}

// SAFETY: the bank is just a pointer into the device aperture; access
// discipline is enforced by the owning driver.
unsafe impl Send for MmioBank {}

/// Window-tracking wrapper around a register bank.
pub struct Registers<B: RegisterBank> {
    bank: B,
    window: Option<u8>,
    int_mask: u16,
}

impl<B: RegisterBank> Registers<B> {
    pub fn new(bank: B) -> Self {
        Self {
            bank,
            window: None,
            int_mask: 0,
        }
    }

    /// Direct access to the bank, for interrupt glue and tests.
    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    /// Select `window` unless it is already current.
    pub fn select_window(&mut self, window: u8) {
        debug_assert!(window < 8);
        if self.window != Some(window) {
            self.bank.write16(CMD, CMD_SELECT_WINDOW | u16::from(window));
            self.window = Some(window);
        }
    }

    pub fn read16_in(&mut self, window: u8, offset: u16) -> u16 {
        self.select_window(window);
        self.bank.read16(offset)
    }

    pub fn write16_in(&mut self, window: u8, offset: u16, value: u16) {
        self.select_window(window);
        self.bank.write16(offset, value)
    }

    pub fn read32_in(&mut self, window: u8, offset: u16) -> u32 {
        self.select_window(window);
        self.bank.read32(offset)
    }

    pub fn write32_in(&mut self, window: u8, offset: u16, value: u32) {
        self.select_window(window);
        self.bank.write32(offset, value)
    }

    /// Read a window-independent register.
    pub fn read32(&mut self, offset: u16) -> u32 {
        debug_assert!(offset >= 0x10, "windowed register needs read32_in");
        self.bank.read32(offset)
    }

    /// Write a window-independent register.
    pub fn write32(&mut self, offset: u16, value: u32) {
        debug_assert!(offset >= 0x10, "windowed register needs write32_in");
        self.bank.write32(offset, value)
    }

    pub fn status(&mut self) -> u16 {
        self.bank.read16(STATUS)
    }

    /// Fire a command without waiting.
    pub fn issue(&mut self, command: u16) {
        self.bank.write16(CMD, command);
    }

    /// Fire a command and poll (bounded) until the busy bit clears.
    pub fn issue_wait(&mut self, command: u16, poll_limit: usize) -> Result<()> {
        self.issue(command);
        for _ in 0..poll_limit {
            if self.status() & CMD_IN_PROGRESS == 0 {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        Err(Error::CmdTimeout)
    }

    /// Program the station address (window 2).
    pub fn set_station_address(&mut self, mac: MacAddress) {
        let o = mac.octets();
        for i in 0..3 {
            let word = u16::from_le_bytes([o[2 * i], o[2 * i + 1]]);
            self.write16_in(2, W2_STATION_ADDR + (i as u16) * 2, word);
        }
    }

    /// Acknowledge serviced interrupt sources.
    pub fn ack(&mut self, sources: u16) {
        self.issue(CMD_ACK_INTR | (sources & ACK_ALL));
    }

    /// Program the unmasked interrupt set.
    pub fn set_int_mask(&mut self, mask: u16) {
        self.int_mask = mask & ACK_ALL;
        self.issue(CMD_SET_INTR_MASK | self.int_mask);
    }

    pub fn int_mask(&self) -> u16 {
        self.int_mask
    }

    /// Mask device interrupts for a short critical section.
    pub fn mask_interrupts(&mut self) {
        self.issue(CMD_SET_INTR_MASK);
    }

    /// Restore the mask programmed by `set_int_mask`.
    pub fn restore_interrupts(&mut self) {
        self.issue(CMD_SET_INTR_MASK | self.int_mask);
    }
}
