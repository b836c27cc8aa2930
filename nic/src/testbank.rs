//! Register-bank emulation for unit tests.
//!
//! Implements just enough device behavior for the access layer and both
//! data paths: command decode with window tracking, FIFO queues for the
//! programmed-I/O path, and list-pointer capture for the bus-master path.

use crate::regs::{self, RegisterBank};
use alloc::collections::VecDeque;
use alloc::vec::Vec;

pub struct MockBank {
    pub window: u8,
    pub status: u16,
    pub int_mask: u16,
    /// Reads of STATUS that still report the busy bit.
    pub busy_reads: usize,
    pub window_selects: usize,
    pub commands: Vec<u16>,
    pub resets: usize,

    // FIFO path.
    pub tx_free: u16,
    pub rx_status: u16,
    pub rx_fifo: VecDeque<u8>,
    pub tx_fifo: Vec<u8>,
    pub discards: usize,

    // Bus-master path.
    pub tx_list_ptr: u32,
    pub rx_list_ptr: u32,
    pub tx_list_writes: usize,
    pub rx_list_writes: usize,

    pub media_status: u16,
}

impl MockBank {
    pub fn new() -> Self {
        Self {
            window: 0,
            status: 0,
            int_mask: 0,
            busy_reads: 0,
            window_selects: 0,
            commands: Vec::new(),
            resets: 0,
            tx_free: 2048,
            rx_status: regs::RX_STATUS_INCOMPLETE,
            rx_fifo: VecDeque::new(),
            tx_fifo: Vec::new(),
            discards: 0,
            tx_list_ptr: 0,
            rx_list_ptr: 0,
            tx_list_writes: 0,
            rx_list_writes: 0,
            media_status: regs::MEDIA_LINK_BEAT,
        }
    }

    /// Queue one received frame on the FIFO path.
    pub fn load_rx_packet(&mut self, frame: &[u8]) {
        self.rx_status = frame.len() as u16 & regs::RX_STATUS_LEN_MASK;
        self.rx_fifo.extend(frame.iter().copied());
        // FIFO reads are doubleword; pad the tail.
        while self.rx_fifo.len() % 4 != 0 {
            self.rx_fifo.push_back(0);
        }
        self.status |= regs::RX_COMPLETE | regs::INT_LATCH;
    }

    /// Report a broken frame of `len` bytes on the FIFO path.
    pub fn load_rx_error(&mut self, len: u16) {
        self.rx_status = regs::RX_STATUS_ERROR | (len & regs::RX_STATUS_LEN_MASK);
        self.status |= regs::RX_COMPLETE | regs::INT_LATCH;
    }
}

impl RegisterBank for MockBank {
    fn read16(&mut self, offset: u16) -> u16 {
        if offset == regs::STATUS {
            let busy = if self.busy_reads > 0 {
                self.busy_reads -= 1;
                regs::CMD_IN_PROGRESS
            } else {
                0
            };
            return self.status | busy;
        }
        match (self.window, offset) {
            (1, regs::W1_RX_STATUS) => self.rx_status,
            (1, regs::W1_TX_FREE) => self.tx_free,
            (4, regs::W4_MEDIA_STATUS) => self.media_status,
            _ => 0,
        }
    }

    fn write16(&mut self, offset: u16, value: u16) {
        if offset != regs::CMD {
            return;
        }
        self.commands.push(value);
        match value >> 11 {
            0 => {
                self.resets += 1;
                self.tx_list_ptr = 0;
                self.rx_list_ptr = 0;
            }
            1 => {
                self.window = (value & 0x7) as u8;
                self.window_selects += 1;
            }
            8 => {
                self.discards += 1;
                self.rx_fifo.clear();
                self.rx_status = regs::RX_STATUS_INCOMPLETE;
            }
            13 => self.status &= !(value & regs::ACK_ALL),
            14 => self.int_mask = value & regs::ACK_ALL,
            _ => {}
        }
    }

    fn read32(&mut self, offset: u16) -> u32 {
        match offset {
            regs::TX_LIST_PTR => self.tx_list_ptr,
            regs::RX_LIST_PTR => self.rx_list_ptr,
            regs::W1_RX_FIFO if self.window == 1 => {
                let mut word = [0u8; 4];
                for b in word.iter_mut() {
                    *b = self.rx_fifo.pop_front().unwrap_or(0);
                }
                u32::from_le_bytes(word)
            }
            _ => 0,
        }
    }

    fn write32(&mut self, offset: u16, value: u32) {
        match offset {
            regs::TX_LIST_PTR => {
                self.tx_list_ptr = value;
                self.tx_list_writes += 1;
            }
            regs::RX_LIST_PTR => {
                self.rx_list_ptr = value;
                self.rx_list_writes += 1;
            }
            regs::W1_TX_FIFO if self.window == 1 => {
                self.tx_fifo.extend_from_slice(&value.to_le_bytes());
                self.tx_free = self.tx_free.saturating_sub(4);
            }
            _ => {}
        }
    }
}
