//! Bus-master path: descriptor rings, coalescing, checksum handling.
//!
//! Composes the ring managers with the placement validator and the cache
//! enforcer. Every buffer bound into a ring went through `dma-guard`, and
//! every hand-off to or from hardware performs its matching sync call.

use super::traits::FrameSink;
use super::NicConfig;
use crate::checksum::{self, ChecksumKernel};
use crate::coalesce::TxIrqPolicy;
use crate::error::{Error, Result};
use crate::pool::BufferPool;
use crate::regs::{
    RegisterBank, Registers, CMD_GLOBAL_RESET, CMD_RX_ENABLE, CMD_TX_ENABLE, DMA_INT_MASK,
    MEDIA_LINK_BEAT, W4_MEDIA_STATUS,
};
use crate::ring::descriptor::{TX_ADD_IP_CHECKSUM, TX_ADD_L4_CHECKSUM};
use crate::ring::{RxConfig, RxRing, TxRing};
use crate::stats::NicStats;
use crate::types::{Generation, MacAddress, MAX_FRAME_LEN, MIN_FRAME_LEN};
use dma_guard::{BufferDescriptor, CacheOps, CoherencyTier, ConstraintProfile, DmaSource, SafeDma};
use log::debug;

pub struct DmaNic<B: RegisterBank, S: DmaSource> {
    regs: Registers<B>,
    dma: SafeDma<S>,
    pool: BufferPool,
    tx: TxRing,
    rx: RxRing,
    generation: Generation,
    mac: MacAddress,
    csum: ChecksumKernel,
    cfg: NicConfig,
}

impl<B: RegisterBank, S: DmaSource> DmaNic<B, S> {
    pub fn new(
        bank: B,
        source: S,
        profile: ConstraintProfile,
        coherency: CoherencyTier,
        generation: Generation,
        mac: MacAddress,
        cfg: NicConfig,
    ) -> Result<Self> {
        assert!(generation.uses_dma(), "FIFO parts take the PIO path");

        let mut regs = Registers::new(bank);
        regs.issue_wait(CMD_GLOBAL_RESET, cfg.poll_limit)?;

        let cache = CacheOps::new(coherency, CacheOps::DEFAULT_LINE_SIZE);
        let mut dma = SafeDma::new(source, profile, cache, cfg.bounce_slots, cfg.buffer_size)?;
        let mut pool = BufferPool::new(&mut dma, cfg.pool_buffers, cfg.buffer_size)?;

        let tx = TxRing::new(&mut dma, cfg.tx_ring_size, TxIrqPolicy::new(&cfg.coalesce))?;
        let rx_cfg = RxConfig {
            refill_threshold: cfg.coalesce.rx_refill_threshold,
            copy_break: cfg.coalesce.copy_break,
        };
        let rx = RxRing::new(&mut regs, &mut dma, &mut pool, cfg.rx_ring_size, rx_cfg)?;

        regs.set_station_address(mac);
        regs.issue(CMD_RX_ENABLE);
        regs.issue(CMD_TX_ENABLE);
        regs.set_int_mask(DMA_INT_MASK);

        debug!(
            "nic: {} path up, mac {}, {}tx/{}rx descriptors",
            generation.name(),
            mac,
            cfg.tx_ring_size,
            cfg.rx_ring_size
        );
        Ok(Self {
            regs,
            dma,
            pool,
            tx,
            rx,
            generation,
            mac,
            csum: ChecksumKernel::select(cfg.wide_checksum_loop),
            cfg,
        })
    }

    pub(crate) fn regs_mut(&mut self) -> &mut Registers<B> {
        &mut self.regs
    }

    #[cfg(test)]
    pub(crate) fn rx_mut(&mut self) -> &mut RxRing {
        &mut self.rx
    }

    pub fn mac_address(&self) -> MacAddress {
        self.mac
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn link_up(&mut self) -> bool {
        self.regs.read16_in(4, W4_MEDIA_STATUS) & MEDIA_LINK_BEAT != 0
    }

    pub fn stats(&self) -> NicStats {
        NicStats {
            tx: self.tx.stats,
            rx: self.rx.stats,
        }
    }

    /// Return a pool buffer handed upward in an `RxFrame::Pooled`.
    pub fn recycle_buffer(&mut self, buf: BufferDescriptor) {
        self.pool.recycle(buf);
    }

    /// Queue one frame. `RingFull`/`Exhausted` are back-pressure.
    pub fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(Error::FrameTooLarge);
        }
        if self.tx.available() == 0 {
            // Opportunistic reclaim before reporting back-pressure.
            self.tx.reclaim(&self.dma, &mut self.pool);
            if self.tx.available() == 0 {
                return Err(Error::RingFull);
            }
        }

        let mut buf = self.pool.take().ok_or(Error::Exhausted)?;
        let wire_len = frame.len().max(MIN_FRAME_LEN);
        {
            let slice = buf.as_mut_slice();
            slice[..frame.len()].copy_from_slice(frame);
            slice[frame.len()..wire_len].fill(0);
        }

        let mut flags = 0;
        if self.generation.checksum_offload() && self.cfg.offload_checksums {
            flags |= TX_ADD_IP_CHECKSUM | TX_ADD_L4_CHECKSUM;
        } else {
            checksum::fill_ipv4_header_checksum(&mut buf.as_mut_slice()[..wire_len], &self.csum);
        }

        self.dma.sync_for_device(&mut buf);

        // The doorbell read/write pair races the interrupt handler's
        // status access; keep the device quiet for these few accesses.
        self.regs.mask_interrupts();
        let res = self
            .tx
            .post(&mut self.regs, &mut self.pool, buf, wire_len, flags);
        self.regs.restore_interrupts();
        res.map(|_| ())
    }

    /// Worker-context pass: reclaim transmit completions, drain receive
    /// work up to `budget`, then run the batched refill.
    pub fn poll_work(&mut self, budget: usize, sink: &mut dyn FrameSink) -> usize {
        self.tx.reclaim(&self.dma, &mut self.pool);
        let processed = self.rx.drain(&self.dma, &mut self.pool, budget, sink);

        self.regs.mask_interrupts();
        self.rx.refill(&mut self.regs, &self.dma, &mut self.pool);
        self.regs.restore_interrupts();
        processed
    }

    /// Reset-and-reinit for the fault path.
    pub fn reinit(&mut self) -> Result<()> {
        self.regs.issue_wait(CMD_GLOBAL_RESET, self.cfg.poll_limit)?;
        self.tx.reset(&self.dma, &mut self.pool);
        self.rx.reset(&mut self.regs, &mut self.dma, &mut self.pool)?;
        self.regs.set_station_address(self.mac);
        self.regs.issue(CMD_RX_ENABLE);
        self.regs.issue(CMD_TX_ENABLE);
        self.regs.set_int_mask(DMA_INT_MASK);
        Ok(())
    }
}
