//! Interrupt/worker hand-off.
//!
//! The interrupt context is allowed exactly two things: acknowledge the
//! hardware latch and record pending work here. Everything else - ring
//! scanning, allocation, delivery - happens in worker context. The
//! hand-off state is purely atomic, so the interrupt side never takes a
//! lock it could spin on.

use crate::driver::facade::Nic;
use crate::driver::traits::{FrameSink, NicDriver};
use crate::regs::RegisterBank;
use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use dma_guard::DmaSource;

/// Work-pending flag shared between the interrupt handler and the worker.
#[derive(Debug, Default)]
pub struct IrqSignal {
    pending: AtomicBool,
    sources: AtomicU16,
}

impl IrqSignal {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            sources: AtomicU16::new(0),
        }
    }

    /// Interrupt side: accumulate sources, then raise the flag. The
    /// ordering guarantees the worker sees the sources once it sees the
    /// flag.
    pub fn record(&self, sources: u16) {
        self.sources.fetch_or(sources, Ordering::Release);
        self.pending.store(true, Ordering::Release);
    }

    /// Worker side: claim pending work. Returns the accumulated sources,
    /// or zero if nothing was pending.
    pub fn take(&self) -> u16 {
        if !self.pending.swap(false, Ordering::Acquire) {
            return 0;
        }
        self.sources.swap(0, Ordering::Acquire)
    }

    pub fn pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.pending.store(false, Ordering::Release);
        self.sources.store(0, Ordering::Release);
    }
}

/// Device cell shared between the interrupt handler and the worker loop.
///
/// # Contract
/// The worker must hold the lock only while device interrupts are masked
/// (the driver masks them itself around doorbell-adjacent sections), so
/// the interrupt side can always acquire it within a bounded wait.
pub struct DeviceCell<B: RegisterBank, S: DmaSource> {
    inner: spin::Mutex<Nic<B, S>>,
}

impl<B: RegisterBank, S: DmaSource> DeviceCell<B, S> {
    pub fn new(nic: Nic<B, S>) -> Self {
        Self {
            inner: spin::Mutex::new(nic),
        }
    }

    /// Interrupt-context entry point.
    pub fn isr(&self) -> bool {
        self.inner.lock().handle_interrupt()
    }

    /// Worker-context drain.
    pub fn service(&self, budget: usize, sink: &mut dyn FrameSink) -> usize {
        self.inner.lock().service(budget, sink)
    }

    /// Run `f` with the device locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut Nic<B, S>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
