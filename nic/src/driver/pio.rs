//! Programmed-I/O path for the FIFO generation.
//!
//! No descriptor rings: transmit pushes words into the TX FIFO after a
//! bounded free-space poll, receive pulls words out of the RX FIFO after
//! checking the packet status register. Every poll loop is bounded so a
//! wedged or absent device costs a counted timeout, never a hang.

use crate::driver::traits::{FrameSink, RxFrame};
use crate::error::{Error, Result};
use crate::regs::{
    self, RegisterBank, Registers, CMD_RX_DISCARD, CMD_RX_ENABLE, CMD_RX_RESET, CMD_TX_ENABLE,
    CMD_TX_RESET, MEDIA_LINK_BEAT, PIO_INT_MASK, RX_STATUS_ERROR, RX_STATUS_INCOMPLETE,
    RX_STATUS_LEN_MASK, W1_RX_FIFO, W1_RX_STATUS, W1_TX_FIFO, W1_TX_FREE, W4_MEDIA_STATUS,
};
use crate::stats::{DirStats, NicStats};
use crate::types::{MacAddress, MAX_FRAME_LEN, MIN_FRAME_LEN};
use alloc::vec::Vec;
use log::debug;

pub struct PioNic<B: RegisterBank> {
    regs: Registers<B>,
    mac: MacAddress,
    poll_limit: usize,
    pub tx_stats: DirStats,
    pub rx_stats: DirStats,
}

impl<B: RegisterBank> PioNic<B> {
    pub fn new(bank: B, mac: MacAddress, poll_limit: usize) -> Result<Self> {
        let mut nic = Self {
            regs: Registers::new(bank),
            mac,
            poll_limit,
            tx_stats: DirStats::default(),
            rx_stats: DirStats::default(),
        };
        nic.bring_up()?;
        debug!("nic: fifo path up, mac {}", mac);
        Ok(nic)
    }

    fn bring_up(&mut self) -> Result<()> {
        self.regs.issue_wait(CMD_TX_RESET, self.poll_limit)?;
        self.regs.issue_wait(CMD_RX_RESET, self.poll_limit)?;
        self.regs.set_station_address(self.mac);
        self.regs.issue(CMD_RX_ENABLE);
        self.regs.issue(CMD_TX_ENABLE);
        self.regs.set_int_mask(PIO_INT_MASK);
        Ok(())
    }

    /// Reset-and-reinit for the fault path.
    pub fn reinit(&mut self) -> Result<()> {
        self.regs
            .issue_wait(regs::CMD_GLOBAL_RESET, self.poll_limit)?;
        self.tx_stats.reset();
        self.rx_stats.reset();
        self.bring_up()
    }

    pub(crate) fn regs_mut(&mut self) -> &mut Registers<B> {
        &mut self.regs
    }

    pub fn mac_address(&self) -> MacAddress {
        self.mac
    }

    pub fn link_up(&mut self) -> bool {
        self.regs.read16_in(4, W4_MEDIA_STATUS) & MEDIA_LINK_BEAT != 0
    }

    pub fn stats(&self) -> NicStats {
        NicStats {
            tx: self.tx_stats,
            rx: self.rx_stats,
        }
    }

    /// Copy one frame into the TX FIFO.
    ///
    /// Word zero is the frame length; payload follows doubleword-padded.
    /// Short frames are padded to the wire minimum.
    pub fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(Error::FrameTooLarge);
        }
        let wire_len = frame.len().max(MIN_FRAME_LEN);
        // Length word plus padded payload.
        let needed = 4 + ((wire_len + 3) & !3);

        let mut space = false;
        for _ in 0..self.poll_limit {
            if usize::from(self.regs.read16_in(1, W1_TX_FREE)) >= needed {
                space = true;
                break;
            }
            core::hint::spin_loop();
        }
        if !space {
            self.tx_stats.errors += 1;
            return Err(Error::FifoTimeout);
        }

        self.regs.write32_in(1, W1_TX_FIFO, wire_len as u32);
        let mut written = 0;
        for chunk in frame.chunks(4) {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.regs.write32_in(1, W1_TX_FIFO, u32::from_le_bytes(word));
            written += 4;
        }
        while written < wire_len {
            self.regs.write32_in(1, W1_TX_FIFO, 0);
            written += 4;
        }

        self.tx_stats.packets += 1;
        self.tx_stats.bytes += wire_len as u64;
        Ok(())
    }

    /// Pull one frame out of the RX FIFO, if any.
    fn try_receive(&mut self) -> Option<Vec<u8>> {
        let status = self.regs.read16_in(1, W1_RX_STATUS);
        if status & RX_STATUS_INCOMPLETE != 0 {
            return None;
        }
        if status & RX_STATUS_ERROR != 0 {
            self.rx_stats.errors += 1;
            self.regs.issue(CMD_RX_DISCARD);
            return None;
        }
        let len = usize::from(status & RX_STATUS_LEN_MASK);
        if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&len) {
            self.rx_stats.errors += 1;
            self.regs.issue(CMD_RX_DISCARD);
            return None;
        }

        let mut frame = Vec::with_capacity((len + 3) & !3);
        for _ in 0..(len + 3) / 4 {
            let word = self.regs.read32_in(1, W1_RX_FIFO);
            frame.extend_from_slice(&word.to_le_bytes());
        }
        frame.truncate(len);
        self.regs.issue(CMD_RX_DISCARD);

        self.rx_stats.packets += 1;
        self.rx_stats.bytes += len as u64;
        Some(frame)
    }

    /// Worker-context drain, bounded by `budget`.
    pub fn poll_work(&mut self, budget: usize, sink: &mut dyn FrameSink) -> usize {
        let mut processed = 0;
        while processed < budget {
            match self.try_receive() {
                Some(frame) => {
                    sink.deliver(RxFrame::Copied(frame));
                    processed += 1;
                }
                None => break,
            }
        }
        processed
    }
}
