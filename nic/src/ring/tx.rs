//! Transmit descriptor ring.

use super::descriptor::{TxDescriptor, DESC_ALIGN, DESC_SIZE, TX_REQUEST_INTERRUPT};
use crate::coalesce::TxIrqPolicy;
use crate::error::{Error, Result};
use crate::pool::BufferPool;
use crate::regs::{RegisterBank, Registers, TX_LIST_PTR};
use crate::stats::DirStats;
use alloc::vec::Vec;
use dma_guard::{BufferDescriptor, Direction, DmaError, DmaSource, SafeDma};

pub struct TxRing {
    /// Backing storage for the descriptor array. Held for its lifetime;
    /// accessed through `descs`.
    #[allow(dead_code)]
    mem: BufferDescriptor,
    descs: *mut TxDescriptor,
    base_bus: u64,
    size: usize,
    mask: usize,
    /// Next slot to post into (producer).
    head: usize,
    /// Next slot to reclaim (consumer scan).
    tail: usize,
    /// Free slots; `RingFull` when zero.
    available: usize,
    bound: Vec<Option<BufferDescriptor>>,
    policy: TxIrqPolicy,
    pub stats: DirStats,
}

impl TxRing {
    /// Allocate and link the descriptor array. `size` must be a power of
    /// two; every slot starts software-owned.
    pub fn new<S: DmaSource>(
        dma: &mut SafeDma<S>,
        size: usize,
        policy: TxIrqPolicy,
    ) -> Result<Self> {
        assert!(size.is_power_of_two(), "ring size must be a power of two");
        let mut mem = dma.allocate(size * DESC_SIZE, DESC_ALIGN, Direction::Bidirectional)?;
        if mem.bounced() {
            // The engine walks the ring by bus address; descriptor memory
            // must be directly reachable.
            dma.release(mem);
            return Err(Error::Dma(DmaError::BadRegion));
        }
        let base_bus = mem.bus_addr();
        let descs = mem.as_mut_slice().as_mut_ptr() as *mut TxDescriptor;

        let mut ring = Self {
            mem,
            descs,
            base_bus,
            size,
            mask: size - 1,
            head: 0,
            tail: 0,
            available: size,
            bound: (0..size).map(|_| None).collect(),
            policy,
            stats: DirStats::default(),
        };
        for i in 0..size {
            let next = ring.desc_bus((i + 1) & ring.mask) as u32;
            let d = ring.desc(i);
            d.clear();
            d.set_next(next);
        }
        Ok(ring)
    }

    #[inline]
    fn desc(&mut self, idx: usize) -> &mut TxDescriptor {
        debug_assert!(idx < self.size);
        // SAFETY: `descs` points at `size` descriptors kept alive by
        // `mem`; idx is masked by every caller.
        unsafe { &mut *self.descs.add(idx) }
    }

    pub(crate) fn descriptor_mut(&mut self, idx: usize) -> &mut TxDescriptor {
        self.desc(idx)
    }

    pub fn desc_bus(&self, idx: usize) -> u64 {
        self.base_bus + (idx * DESC_SIZE) as u64
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn available(&self) -> usize {
        self.available
    }

    pub fn in_flight(&self) -> usize {
        self.size - self.available
    }

    /// Post one frame buffer to hardware.
    ///
    /// The caller has already copied the frame into `buf` and synced it
    /// for the device. On `RingFull` the buffer goes straight back to the
    /// pool and the caller applies back-pressure. Returns whether the
    /// descriptor carries an interrupt request.
    pub fn post<B: RegisterBank>(
        &mut self,
        regs: &mut Registers<B>,
        pool: &mut BufferPool,
        buf: BufferDescriptor,
        frame_len: usize,
        flags: u32,
    ) -> Result<bool> {
        if self.available == 0 {
            pool.recycle(buf);
            return Err(Error::RingFull);
        }
        debug_assert!(frame_len <= buf.len());

        let slot = self.head;
        let mut flags = flags;
        let request_irq = self.policy.on_post(self.size);
        if request_irq {
            flags |= TX_REQUEST_INTERRUPT;
        }

        let bus = buf.bus_addr();
        self.desc(slot).post(bus, frame_len, flags);
        self.bound[slot] = Some(buf);
        self.head = (slot + 1) & self.mask;
        self.available -= 1;
        self.stats.packets += 1;
        self.stats.bytes += frame_len as u64;

        // One list-pointer write restarts an idle engine; a running one
        // follows the next links on its own.
        if regs.read32(TX_LIST_PTR) == 0 {
            regs.write32(TX_LIST_PTR, self.desc_bus(slot) as u32);
            self.stats.doorbell_writes += 1;
        }
        Ok(request_irq)
    }

    /// Reclaim completed descriptors, returning their buffers to the
    /// pool. Stops at the first slot hardware still owns.
    pub fn reclaim<S: DmaSource>(
        &mut self,
        dma: &SafeDma<S>,
        pool: &mut BufferPool,
    ) -> usize {
        let mut reclaimed = 0;
        while self.available < self.size {
            let idx = self.tail;
            {
                let d = self.desc(idx);
                if d.is_hw_owned() || !d.is_complete() {
                    break;
                }
                if d.has_error() {
                    self.stats.errors += 1;
                }
            }
            self.desc(idx).clear();
            let mut buf = self.bound[idx]
                .take()
                .expect("completed TX slot with no bound buffer");
            dma.sync_for_cpu(&mut buf);
            pool.recycle(buf);
            self.tail = (idx + 1) & self.mask;
            self.available += 1;
            reclaimed += 1;
        }
        self.policy.on_reclaim(reclaimed);
        reclaimed
    }

    /// Return the ring to its post-init state (device reset path).
    pub fn reset<S: DmaSource>(&mut self, dma: &SafeDma<S>, pool: &mut BufferPool) {
        for idx in 0..self.size {
            if let Some(mut buf) = self.bound[idx].take() {
                dma.sync_for_cpu(&mut buf);
                pool.recycle(buf);
            }
            self.desc(idx).clear();
        }
        self.head = 0;
        self.tail = 0;
        self.available = self.size;
        self.policy.reset();
        self.stats.reset();
    }
}

// SAFETY: `descs` points into memory owned by `mem`; the ring is used
// from one context at a time.
unsafe impl Send for TxRing {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coalesce::CoalesceConfig;
    use crate::ring::descriptor::{DESC_COMPLETE, DESC_ERROR};
    use crate::testbank::MockBank;
    use crate::testdma;

    struct Rig {
        regs: Registers<MockBank>,
        dma: SafeDma<testdma::TestSource>,
        pool: BufferPool,
        ring: TxRing,
    }

    fn rig(ring_size: usize) -> Rig {
        let mut dma = testdma::safe_dma();
        let pool = BufferPool::new(&mut dma, ring_size + 4, 2048).unwrap();
        let policy = TxIrqPolicy::new(&CoalesceConfig::default());
        let ring = TxRing::new(&mut dma, ring_size, policy).unwrap();
        Rig {
            regs: Registers::new(MockBank::new()),
            dma,
            pool,
            ring,
        }
    }

    fn post_one(rig: &mut Rig, len: usize) -> Result<bool> {
        let mut buf = rig.pool.take().unwrap();
        buf.as_mut_slice()[..len].fill(0xEE);
        rig.dma.sync_for_device(&mut buf);
        rig.ring.post(&mut rig.regs, &mut rig.pool, buf, len, 0)
    }

    fn complete(rig: &mut Rig, idx: usize) {
        rig.ring.descriptor_mut(idx).set_raw_status(DESC_COMPLETE);
    }

    #[test]
    fn test_post_reclaim_invariants() {
        let mut r = rig(8);
        for i in 0..5 {
            post_one(&mut r, 64).unwrap();
            assert_eq!(r.ring.available(), 8 - i - 1);
            assert!(r.ring.head() < 8 && r.ring.tail() < 8);
        }
        for i in 0..5 {
            complete(&mut r, i);
        }
        assert_eq!(r.ring.reclaim(&r.dma, &mut r.pool), 5);
        assert_eq!(r.ring.available(), 8);
        assert_eq!(r.ring.tail(), 5);
        assert_eq!(r.pool.available(), r.pool.total());
    }

    #[test]
    fn test_ring_full_backpressure() {
        let mut r = rig(4);
        for _ in 0..4 {
            post_one(&mut r, 64).unwrap();
        }
        let before = r.pool.available();
        assert_eq!(post_one(&mut r, 64), Err(Error::RingFull));
        // The rejected buffer went back to the pool.
        assert_eq!(r.pool.available(), before);
        assert_eq!(r.ring.available(), 0);
    }

    #[test]
    fn test_doorbell_only_when_idle() {
        let mut r = rig(8);
        post_one(&mut r, 64).unwrap();
        assert_eq!(r.regs.bank_mut().tx_list_writes, 1);
        assert_eq!(
            r.regs.bank_mut().tx_list_ptr,
            r.ring.desc_bus(0) as u32
        );
        // Engine still running: no further doorbell.
        post_one(&mut r, 64).unwrap();
        post_one(&mut r, 64).unwrap();
        assert_eq!(r.regs.bank_mut().tx_list_writes, 1);

        // Engine went idle; the next post rings again.
        r.regs.bank_mut().tx_list_ptr = 0;
        post_one(&mut r, 64).unwrap();
        assert_eq!(r.regs.bank_mut().tx_list_writes, 2);
        assert_eq!(r.ring.stats.doorbell_writes, 2);
    }

    #[test]
    fn test_reclaim_stops_at_hw_owned() {
        let mut r = rig(8);
        for _ in 0..4 {
            post_one(&mut r, 64).unwrap();
        }
        complete(&mut r, 0);
        complete(&mut r, 1);
        // Slots 2 and 3 still belong to hardware.
        assert_eq!(r.ring.reclaim(&r.dma, &mut r.pool), 2);
        assert_eq!(r.ring.available(), 6);
        assert_eq!(r.ring.tail(), 2);
    }

    #[test]
    fn test_error_completions_counted() {
        let mut r = rig(8);
        post_one(&mut r, 64).unwrap();
        r.ring
            .descriptor_mut(0)
            .set_raw_status(DESC_COMPLETE | DESC_ERROR);
        assert_eq!(r.ring.reclaim(&r.dma, &mut r.pool), 1);
        assert_eq!(r.ring.stats.errors, 1);
    }

    #[test]
    fn test_first_post_carries_interrupt_flag() {
        let mut r = rig(8);
        assert!(post_one(&mut r, 64).unwrap());
        assert!(r.ring.descriptor_mut(0).raw_status() & TX_REQUEST_INTERRUPT != 0);
        assert!(!post_one(&mut r, 64).unwrap());
        assert!(r.ring.descriptor_mut(1).raw_status() & TX_REQUEST_INTERRUPT == 0);
    }

    #[test]
    fn test_wraparound_stays_in_range() {
        let mut r = rig(4);
        for _ in 0..10 {
            post_one(&mut r, 60).unwrap();
            let idx = (r.ring.head() + 4 - 1) % 4;
            complete(&mut r, idx);
            assert_eq!(r.ring.reclaim(&r.dma, &mut r.pool), 1);
            assert!(r.ring.head() < 4 && r.ring.tail() < 4);
            assert_eq!(r.ring.available(), 4);
        }
    }
}
