//! Generation dispatch and the shared fault state machine.
//!
//! The path is chosen exactly once, at init, from the externally supplied
//! generation flag; afterwards the rest of the system talks to one
//! transmit/receive/interrupt contract and never branches on hardware
//! age.
//!
//! Fault handling is shared by both paths:
//!
//! ```text
//!   Running --host-error--> Resetting --reinit ok--> Running
//!                               |
//!                               +-----reinit failed--> Failed (terminal)
//! ```
//!
//! Ordinary ring-full and FIFO-timeout conditions never enter this
//! machine; they are transient and handled by the caller's own backoff.

use super::dma::DmaNic;
use super::pio::PioNic;
use super::traits::{FrameSink, NicDriver, RxFrame};
use super::NicConfig;
use crate::error::{Error, Result};
use crate::irq::IrqSignal;
use crate::regs::{RegisterBank, HOST_ERROR, INT_LATCH};
use crate::stats::NicStats;
use crate::types::{Generation, MacAddress};
use dma_guard::{CoherencyTier, ConstraintProfile, DmaSource};
use log::{error, warn};

/// Device lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Running,
    Resetting,
    /// Reset failed; surfaced to the caller, no automatic retry.
    Failed,
}

/// External inputs consumed once at init.
#[derive(Debug, Clone, Copy)]
pub struct NicSetup {
    /// Controller generation, from the device database.
    pub generation: Generation,
    /// Station address, from configuration storage.
    pub mac: MacAddress,
    /// DMA placement constraints, from the device database.
    pub profile: ConstraintProfile,
    /// Platform cache-coherency capability.
    pub coherency: CoherencyTier,
}

enum Path<B: RegisterBank, S: DmaSource> {
    Pio(PioNic<B>),
    Dma(DmaNic<B, S>),
}

/// One Ethernet device, either generation.
pub struct Nic<B: RegisterBank, S: DmaSource> {
    path: Path<B, S>,
    state: DeviceState,
    signal: IrqSignal,
    generation: Generation,
}

impl<B: RegisterBank, S: DmaSource> Nic<B, S> {
    /// Bring the device up on the path its generation dictates.
    ///
    /// The FIFO path has no use for the DMA source; it is dropped.
    pub fn new(setup: NicSetup, bank: B, source: S, cfg: NicConfig) -> Result<Self> {
        let path = match setup.generation {
            Generation::Fifo => {
                drop(source);
                Path::Pio(PioNic::new(bank, setup.mac, cfg.poll_limit)?)
            }
            generation => Path::Dma(DmaNic::new(
                bank,
                source,
                setup.profile,
                setup.coherency,
                generation,
                setup.mac,
                cfg,
            )?),
        };
        Ok(Self {
            path,
            state: DeviceState::Running,
            signal: IrqSignal::new(),
            generation: setup.generation,
        })
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The flag the interrupt handler shares with the worker.
    pub fn signal(&self) -> &IrqSignal {
        &self.signal
    }

    /// Return a pool buffer handed upward in an `RxFrame::Pooled`.
    pub fn recycle(&mut self, frame: RxFrame) {
        if let RxFrame::Pooled { buf, .. } = frame {
            match &mut self.path {
                Path::Dma(d) => d.recycle_buffer(buf),
                // The FIFO path never emits pooled frames.
                Path::Pio(_) => unreachable!("pooled frame from the FIFO path"),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn test_regs(&mut self) -> &mut crate::regs::Registers<B> {
        match &mut self.path {
            Path::Pio(p) => p.regs_mut(),
            Path::Dma(d) => d.regs_mut(),
        }
    }

    /// Drive the fault state machine through one reset attempt.
    pub fn reset(&mut self) -> DeviceState {
        self.state = DeviceState::Resetting;
        warn!("nic: resetting after host error");
        let outcome = match &mut self.path {
            Path::Pio(p) => p.reinit(),
            Path::Dma(d) => d.reinit(),
        };
        self.state = match outcome {
            Ok(()) => {
                self.signal.clear();
                DeviceState::Running
            }
            Err(e) => {
                error!("nic: reset failed: {}", e);
                DeviceState::Failed
            }
        };
        self.state
    }
}

impl<B: RegisterBank, S: DmaSource> NicDriver for Nic<B, S> {
    fn mac_address(&self) -> MacAddress {
        match &self.path {
            Path::Pio(p) => p.mac_address(),
            Path::Dma(d) => d.mac_address(),
        }
    }

    fn link_up(&mut self) -> bool {
        match &mut self.path {
            Path::Pio(p) => p.link_up(),
            Path::Dma(d) => d.link_up(),
        }
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        if self.state != DeviceState::Running {
            return Err(Error::DeviceFailed);
        }
        match &mut self.path {
            Path::Pio(p) => p.transmit(frame),
            Path::Dma(d) => d.transmit(frame),
        }
    }

    /// NAPI-style worker drain.
    ///
    /// Processes at most `budget` frames, then yields even if work
    /// remains so one device cannot starve others. Before yielding early
    /// it re-checks the pending flag, re-looping if an interrupt landed
    /// mid-drain - otherwise that wakeup would be lost.
    fn service(&mut self, budget: usize, sink: &mut dyn FrameSink) -> usize {
        if self.state == DeviceState::Failed {
            return 0;
        }
        let mut done = 0;
        loop {
            let sources = self.signal.take();
            if sources & HOST_ERROR != 0 {
                if self.reset() == DeviceState::Failed {
                    return done;
                }
                continue;
            }

            done += match &mut self.path {
                Path::Pio(p) => p.poll_work(budget - done, sink),
                Path::Dma(d) => d.poll_work(budget - done, sink),
            };

            // Sources are acknowledged only now, after being serviced.
            if sources != 0 {
                let regs = match &mut self.path {
                    Path::Pio(p) => p.regs_mut(),
                    Path::Dma(d) => d.regs_mut(),
                };
                regs.ack(sources & !INT_LATCH);
            }

            if done >= budget {
                break;
            }
            if !self.signal.pending() {
                break;
            }
        }
        done
    }

    /// Interrupt-context entry: acknowledge the latch, record the active
    /// sources, and return. No ring walking, no allocation, no delivery.
    fn handle_interrupt(&mut self) -> bool {
        let regs = match &mut self.path {
            Path::Pio(p) => p.regs_mut(),
            Path::Dma(d) => d.regs_mut(),
        };
        let status = regs.status();
        if status & INT_LATCH == 0 {
            return false;
        }
        let sources = status & regs.int_mask();
        regs.ack(INT_LATCH);
        self.signal.record(sources);
        true
    }

    fn stats(&self) -> NicStats {
        match &self.path {
            Path::Pio(p) => p.stats(),
            Path::Dma(d) => d.stats(),
        }
    }
}
